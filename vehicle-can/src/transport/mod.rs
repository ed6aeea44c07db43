//! Frame transports
//!
//! A transport hands raw frames to the ingestion loop. Two implementations
//! exist:
//! - [`SocketCanBus`]: a raw SocketCAN socket bound to one interface (Linux)
//! - [`ReplayTransport`]: frames recorded in a candump log

use crate::types::{CanFrame, Result};

pub mod replay;
#[cfg(target_os = "linux")]
pub mod socket;

pub use replay::{parse_candump_line, RecordedFrame, ReplayTransport};
#[cfg(target_os = "linux")]
pub use socket::SocketCanBus;

/// Common trait for all frame sources
///
/// `receive` returns:
/// - `Ok(Some(frame))` for a complete frame
/// - `Ok(None)` when no frame is available this cycle (interrupted call,
///   timeout, truncated read)
/// - `Err(TransportError::Closed)` when a finite source is exhausted
/// - any other `Err` for I/O failures the caller may retry
pub trait FrameTransport: Send {
    /// Human-readable name of the source (interface or file)
    fn name(&self) -> &str;

    /// Wait for the next frame
    fn receive(&mut self) -> Result<Option<CanFrame>>;

    /// Send one frame. Returns false unless the whole frame was written.
    fn send(&mut self, frame: &CanFrame) -> bool;
}

impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn receive(&mut self) -> Result<Option<CanFrame>> {
        (**self).receive()
    }

    fn send(&mut self, frame: &CanFrame) -> bool {
        (**self).send(frame)
    }
}

/// True for I/O errors that only mean "no frame this cycle"
pub(crate) fn is_transient(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        error.kind(),
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&Error::from(ErrorKind::Interrupted)));
        assert!(is_transient(&Error::from(ErrorKind::WouldBlock)));
        assert!(is_transient(&Error::from(ErrorKind::UnexpectedEof)));
        assert!(!is_transient(&Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_transient(&Error::from(ErrorKind::NotFound)));
    }
}
