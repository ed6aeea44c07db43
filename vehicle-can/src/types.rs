//! Core types for the vehicle CAN core
//!
//! This module defines the frame record handed from a transport to the decoder
//! table, plus the error types shared by the whole library.

use byteorder::{BigEndian, ByteOrder, NativeEndian};
use chrono::{DateTime, Utc};
use std::fmt;

/// Timestamp type used for recorded traffic
pub type Timestamp = DateTime<Utc>;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Largest valid standard (11-bit) identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Largest valid extended (29-bit) identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Payload capacity of a classic CAN frame
pub const MAX_DATA_LENGTH: usize = 8;

/// Flag bits of the kernel's `can_id` word
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

/// Identifier bits of the `can_id` word
pub const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

/// A single classic CAN frame as received from (or sent to) a transport.
///
/// The payload is always stored as 8 bytes. Bytes past `len` are zero, so a
/// decoder reading a fixed offset from a short frame sees zeros rather than
/// stale data from an earlier frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanFrame {
    /// Payload bytes
    pub data: [u8; MAX_DATA_LENGTH],
    /// CAN identifier with all flag bits stripped (11-bit or 29-bit)
    pub id: u32,
    /// Number of valid payload bytes (0-8)
    pub len: u8,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is a remote transmission request
    pub is_remote: bool,
    /// True if this is an error frame
    pub is_error: bool,
}

impl CanFrame {
    /// Create a data frame. Identifiers above 0x7FF are sent in extended format.
    ///
    /// Returns `None` if the payload is longer than 8 bytes or the identifier
    /// does not fit in 29 bits.
    pub fn new(id: u32, data: &[u8]) -> Option<Self> {
        if id > MAX_EXTENDED_ID || data.len() > MAX_DATA_LENGTH {
            return None;
        }
        let mut frame = Self {
            id,
            len: data.len() as u8,
            is_extended: id > MAX_STANDARD_ID,
            ..Self::default()
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    /// Create a data frame that uses the extended format even for small ids
    pub fn new_extended(id: u32, data: &[u8]) -> Option<Self> {
        let mut frame = Self::new(id, data)?;
        frame.is_extended = true;
        Some(frame)
    }

    /// Create a remote transmission request for `dlc` bytes
    pub fn new_remote(id: u32, dlc: u8) -> Option<Self> {
        if id > MAX_EXTENDED_ID || dlc as usize > MAX_DATA_LENGTH {
            return None;
        }
        Some(Self {
            id,
            len: dlc,
            is_extended: id > MAX_STANDARD_ID,
            is_remote: true,
            ..Self::default()
        })
    }

    /// Build a frame from the kernel's `can_id` word (identifier plus flag
    /// bits) and a payload. Payload bytes past 8 are dropped.
    pub fn from_id_word(word: u32, data: &[u8]) -> Self {
        let len = data.len().min(MAX_DATA_LENGTH);
        let mut frame = Self {
            id: word & CAN_ID_MASK,
            len: len as u8,
            is_extended: word & CAN_EFF_FLAG != 0,
            is_remote: word & CAN_RTR_FLAG != 0,
            is_error: word & CAN_ERR_FLAG != 0,
            ..Self::default()
        };
        frame.data[..len].copy_from_slice(&data[..len]);
        frame
    }

    /// The kernel's `can_id` word: identifier plus flag bits
    pub fn id_word(&self) -> u32 {
        let mut word = self.id & CAN_ID_MASK;
        if self.is_extended {
            word |= CAN_EFF_FLAG;
        }
        if self.is_remote {
            word |= CAN_RTR_FLAG;
        }
        if self.is_error {
            word |= CAN_ERR_FLAG;
        }
        word
    }

    /// The valid part of the payload
    pub fn data(&self) -> &[u8] {
        let len = (self.len as usize).min(MAX_DATA_LENGTH);
        &self.data[..len]
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.len as usize
    }

    /// The whole payload viewed as one 64-bit word in host byte order.
    ///
    /// This is only a packed view; its numeric value differs between little-
    /// and big-endian hosts. Decoders use [`CanFrame::byte`] and
    /// [`CanFrame::be_u16`] instead.
    pub fn data_u64(&self) -> u64 {
        NativeEndian::read_u64(&self.data)
    }

    /// Set the payload from a 64-bit word in host byte order
    pub fn set_data_u64(&mut self, word: u64) {
        NativeEndian::write_u64(&mut self.data, word);
    }

    /// Read one payload byte
    ///
    /// # Panics
    ///
    /// Panics if `offset` is 8 or more.
    pub fn byte(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    /// Read a big-endian 16-bit field starting at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `offset` is 7 or more.
    pub fn be_u16(&self, offset: usize) -> u16 {
        BigEndian::read_u16(&self.data[offset..offset + 2])
    }
}

impl fmt::Display for CanFrame {
    /// candump-style rendering: `03B#006400C8`, `1ABCDEF0#R4`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#", self.id)?;
        } else {
            write!(f, "{:03X}#", self.id)?;
        }
        if self.is_remote {
            return write!(f, "R{}", self.len);
        }
        for byte in self.data() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Errors raised by frame transports
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open CAN interface {interface}: {source}")]
    Connection {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport closed")]
    Closed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Build a connection error for `interface`
    pub fn connection(interface: impl Into<String>, source: std::io::Error) -> Self {
        TransportError::Connection {
            interface: interface.into(),
            source,
        }
    }
}

/// Errors raised while validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
