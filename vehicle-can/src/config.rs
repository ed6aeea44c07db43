//! Bus and ingestion configuration types
//!
//! Both records deserialize with serde so an application can embed them in
//! its own configuration file. Every field has a default.

use crate::types::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which CAN interface to bind, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Interface to bind. When unset, `primary_interface` is tried first and
    /// `fallback_interface` second.
    #[serde(default)]
    pub interface: Option<String>,

    /// First interface tried when none is given (default: can0)
    #[serde(default = "default_primary")]
    pub primary_interface: String,

    /// Interface tried when the primary one cannot be opened (default: vcan0)
    #[serde(default = "default_fallback")]
    pub fallback_interface: String,

    /// Optional receive timeout in milliseconds. Without one, a receive
    /// blocks until a frame arrives.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

fn default_primary() -> String {
    "can0".to_string()
}

fn default_fallback() -> String {
    "vcan0".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: None,
            primary_interface: default_primary(),
            fallback_interface: default_fallback(),
            read_timeout_ms: None,
        }
    }
}

impl BusConfig {
    /// Create a new bus configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: bind exactly this interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Builder method: set the interfaces tried when none is given
    pub fn with_defaults(mut self, primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.primary_interface = primary.into();
        self.fallback_interface = fallback.into();
        self
    }

    /// Builder method: set the receive timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Interfaces to try, in order
    pub fn candidates(&self) -> Vec<&str> {
        match &self.interface {
            Some(name) => vec![name.as_str()],
            None => vec![
                self.primary_interface.as_str(),
                self.fallback_interface.as_str(),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates().iter().any(|name| name.is_empty()) {
            return Err(ConfigError::Invalid(
                "CAN interface name cannot be empty".to_string(),
            ));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "Read timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the ingestion loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Name given to the ingestion thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Pause after a failed receive, in milliseconds (default: 100ms)
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,
}

fn default_thread_name() -> String {
    "can-ingest".to_string()
}

fn default_error_backoff() -> u64 {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            error_backoff_ms: default_error_backoff(),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the pause after a failed receive
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates() {
        let config = BusConfig::new();
        assert_eq!(config.candidates(), vec!["can0", "vcan0"]);
        assert!(config.read_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bus_config_builder() {
        let config = BusConfig::new()
            .with_interface("can1")
            .with_read_timeout(Duration::from_millis(250));

        assert_eq!(config.candidates(), vec!["can1"]);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));

        let config = BusConfig::new().with_defaults("slcan0", "vcan1");
        assert_eq!(config.candidates(), vec!["slcan0", "vcan1"]);
    }

    #[test]
    fn test_validation() {
        assert!(BusConfig::new().with_interface("").validate().is_err());

        let mut config = BusConfig::new();
        config.read_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ingest_defaults() {
        let config = IngestConfig::new();
        assert_eq!(config.thread_name, "can-ingest");
        assert_eq!(config.error_backoff(), Duration::from_millis(100));

        let config = config.with_error_backoff(Duration::from_millis(5));
        assert_eq!(config.error_backoff_ms, 5);
    }
}
