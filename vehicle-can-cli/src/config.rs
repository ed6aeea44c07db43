//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use vehicle_can::{BusConfig, IngestConfig, Signal, UnitSystem};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(default)]
    pub format: OutputFormat,
    /// Time between snapshots
    #[serde(default = "default_period")]
    pub period_ms: u64,
    /// Signal keys to show, in order. Empty means all.
    #[serde(default)]
    pub signals: Vec<String>,
    /// Include the derived battery power line
    #[serde(default = "default_true")]
    pub show_power: bool,
}

fn default_period() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            units: UnitSystem::default(),
            format: OutputFormat::default(),
            period_ms: default_period(),
            signals: Vec::new(),
            show_power: true,
        }
    }
}

impl DisplayConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Resolve the configured signal keys
    pub fn selected_signals(&self) -> Result<Vec<Signal>> {
        if self.signals.is_empty() {
            return Ok(Signal::ALL.to_vec());
        }

        self.signals
            .iter()
            .map(|key| {
                Signal::from_key(key).with_context(|| {
                    let known: Vec<_> = Signal::ALL.iter().map(|s| s.key()).collect();
                    format!("Unknown signal '{}' (known: {})", key, known.join(", "))
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate(&config).with_context(|| format!("Invalid config file: {:?}", path))?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    config.bus.validate()?;
    if config.display.period_ms == 0 {
        bail!("display.period_ms must be greater than zero");
    }
    config.display.selected_signals()?;
    Ok(())
}
