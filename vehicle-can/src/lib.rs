//! Vehicle CAN Library
//!
//! Receives raw frames from a vehicle CAN bus, decodes the known message
//! identifiers into named physical parameters, and keeps those parameters
//! ready for display in metric or imperial units.
//!
//! # Architecture
//!
//! - [`transport`]: frame sources. A raw SocketCAN socket bound to one
//!   interface, or a candump log replayed from disk
//! - [`decoder`]: a table mapping each message identifier to the payload
//!   fields it carries and the parameter each field updates
//! - [`parameter`]: one physical quantity with unit conversion and a cached,
//!   fixed-width display string per unit system
//! - [`signals`]: the registry of every parameter the vehicle protocol decodes
//! - [`ingest`]: a background thread that receives frames and dispatches them
//!
//! The ingestion thread is the only writer of parameter values. Any number of
//! reader threads may query values and display strings concurrently; every
//! accessor sees one whole update, and
//! [`Parameter::reading`](parameter::Parameter::reading) returns a value and
//! string that belong to the same update.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use vehicle_can::{BusConfig, DecoderTable, Ingestion, SocketCanBus, VehicleSignals};
//!
//! let bus = SocketCanBus::from_config(&BusConfig::default()).unwrap();
//! let signals = Arc::new(VehicleSignals::new());
//! let handle = Ingestion::new(bus, Arc::new(DecoderTable::vehicle()), signals.clone())
//!     .spawn()
//!     .unwrap();
//!
//! loop {
//!     println!("Speed: {} {}", signals.speed.string(), signals.speed.units());
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//! #   break;
//! }
//! # handle.stop();
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod ingest;
pub mod parameter;
pub mod signals;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::{BusConfig, IngestConfig};
pub use decoder::{
    sign_extend, DecoderTable, FieldEncoding, FieldLayout, FrameDecoder, FrameHandler,
    MessageLayout, TableStats, VEHICLE_PROTOCOL,
};
pub use ingest::{IngestStats, IngestStatsSnapshot, Ingestion, IngestionHandle};
pub use parameter::{
    DisplayString, Parameter, ParameterSnapshot, ParameterSpec, UnitSystem, PLACEHOLDER,
};
pub use signals::{Signal, VehicleSignals};
pub use transport::{parse_candump_line, FrameTransport, RecordedFrame, ReplayTransport};
#[cfg(target_os = "linux")]
pub use transport::SocketCanBus;
pub use types::{CanFrame, ConfigError, Result, Timestamp, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: the vehicle table knows every protocol message
        let table = DecoderTable::vehicle();
        let stats = table.stats();
        assert_eq!(stats.num_messages, VEHICLE_PROTOCOL.len());

        let signals = VehicleSignals::new();
        assert_eq!(signals.speed.string().as_str(), PLACEHOLDER);
    }
}
