//! SocketCAN transport
//!
//! Binds a raw CAN socket to one network interface. Frames cross the socket
//! in the kernel's native `struct can_frame` layout; the `socketcan` crate
//! handles that encoding. The socket is closed when the bus is dropped.

use super::{is_transient, FrameTransport};
use crate::config::BusConfig;
use crate::types::{CanFrame, Result, TransportError};
use socketcan::{
    CanFrame as SocketFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket, StandardId,
};

/// A raw CAN socket bound to one interface
pub struct SocketCanBus {
    socket: CanSocket,
    interface: String,
}

impl SocketCanBus {
    /// Bind a raw CAN socket to `interface`
    ///
    /// Fails with [`TransportError::Connection`] if the socket cannot be
    /// created, the interface does not exist, or the bind fails.
    pub fn open(interface: &str) -> Result<Self> {
        log::info!("Opening CAN interface: {}", interface);

        let socket = CanSocket::open(interface)
            .map_err(|e| TransportError::connection(interface, e))?;

        log::info!("CAN interface {} opened successfully", interface);
        Ok(Self {
            socket,
            interface: interface.to_string(),
        })
    }

    /// Open `can0`, falling back to `vcan0`
    pub fn open_default() -> Result<Self> {
        Self::from_config(&BusConfig::default())
    }

    /// Open the interface(s) named by `config`, in order, and apply its
    /// receive timeout
    pub fn from_config(config: &BusConfig) -> Result<Self> {
        config.validate()?;

        let mut last_error = None;
        for interface in config.candidates() {
            match Self::open(interface) {
                Ok(bus) => {
                    if let Some(timeout) = config.read_timeout() {
                        bus.socket
                            .set_read_timeout(timeout)
                            .map_err(|e| TransportError::connection(interface, e))?;
                    }
                    return Ok(bus);
                }
                Err(e) => {
                    log::warn!("{}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::Closed))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameTransport for SocketCanBus {
    fn name(&self) -> &str {
        &self.interface
    }

    /// Blocks for one frame, or until the read timeout expires.
    ///
    /// `socketcan` reads a whole `struct can_frame` per call and CAN_RAW
    /// always delivers whole frames, so a partial datagram is never seen
    /// here. A timeout or interrupted call yields `Ok(None)`.
    fn receive(&mut self) -> Result<Option<CanFrame>> {
        match self.socket.read_frame() {
            Ok(frame) => {
                let mut record =
                    CanFrame::from_id_word(Frame::id_word(&frame), EmbeddedFrame::data(&frame));
                if record.is_remote {
                    record.len = EmbeddedFrame::dlc(&frame) as u8;
                }
                Ok(Some(record))
            }
            Err(e) if is_transient(&e) => {
                log::trace!("No frame on {}: {}", self.interface, e);
                Ok(None)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn send(&mut self, frame: &CanFrame) -> bool {
        let Some(outgoing) = to_socket_frame(frame) else {
            log::warn!("Cannot send frame {} on {}", frame, self.interface);
            return false;
        };

        match self.socket.write_frame(&outgoing) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Failed to send {} on {}: {}", frame, self.interface, e);
                false
            }
        }
    }
}

/// Convert a frame record into a `socketcan` frame. Error frames are
/// generated by controllers and cannot be sent.
fn to_socket_frame(frame: &CanFrame) -> Option<SocketFrame> {
    if frame.is_error {
        return None;
    }

    let id = if frame.is_extended {
        Id::Extended(ExtendedId::new(frame.id)?)
    } else {
        Id::Standard(StandardId::new(u16::try_from(frame.id).ok()?)?)
    };

    if frame.is_remote {
        <SocketFrame as EmbeddedFrame>::new_remote(id, frame.dlc())
    } else {
        <SocketFrame as EmbeddedFrame>::new(id, frame.data())
    }
}
