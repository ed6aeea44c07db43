//! Frame decoding
//!
//! The [`DecoderTable`] maps arbitration IDs to decoders. Most decoders are
//! declarative [`MessageLayout`]s: a list of fixed-offset fields, each routed
//! to one [`Signal`]. Frames with an unknown ID are ignored.
//!
//! Decoders only extract raw integers and publish them with
//! [`Parameter::update`](crate::Parameter::update). Scaling and formatting
//! belong to the parameter.

use crate::signals::{Signal, VehicleSignals};
use crate::types::{CanFrame, ConfigError, MAX_DATA_LENGTH};
use std::collections::HashMap;
use std::fmt;

/// How a field is packed into the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// One unsigned byte
    U8,
    /// Two bytes, big-endian, unsigned
    BeU16,
    /// Two bytes, big-endian, holding a two's complement value in the low
    /// `bits` bits. The upper bits of the transport field are ignored.
    BeSigned { bits: u8 },
}

impl FieldEncoding {
    /// Number of payload bytes the field occupies
    pub const fn size(&self) -> usize {
        match self {
            FieldEncoding::U8 => 1,
            FieldEncoding::BeU16 | FieldEncoding::BeSigned { .. } => 2,
        }
    }
}

/// One signal at a fixed position in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub signal: Signal,
    /// Byte offset of the first (most significant) byte
    pub offset: u8,
    pub encoding: FieldEncoding,
}

impl FieldLayout {
    pub const fn u8(signal: Signal, offset: u8) -> Self {
        Self {
            signal,
            offset,
            encoding: FieldEncoding::U8,
        }
    }

    pub const fn be_u16(signal: Signal, offset: u8) -> Self {
        Self {
            signal,
            offset,
            encoding: FieldEncoding::BeU16,
        }
    }

    pub const fn be_signed(signal: Signal, offset: u8, bits: u8) -> Self {
        Self {
            signal,
            offset,
            encoding: FieldEncoding::BeSigned { bits },
        }
    }

    /// One past the last payload byte this field reads
    pub const fn end(&self) -> usize {
        self.offset as usize + self.encoding.size()
    }

    /// Extract the raw value from a frame. Returns `None` if the field does
    /// not fit in an 8-byte payload.
    pub fn extract(&self, frame: &CanFrame) -> Option<i32> {
        if self.end() > MAX_DATA_LENGTH {
            return None;
        }
        let offset = self.offset as usize;
        let raw = match self.encoding {
            FieldEncoding::U8 => frame.byte(offset) as i32,
            FieldEncoding::BeU16 => frame.be_u16(offset) as i32,
            FieldEncoding::BeSigned { bits } => sign_extend(frame.be_u16(offset) as u32, bits),
        };
        Some(raw)
    }
}

/// A frame type with a fixed field layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLayout {
    pub id: u32,
    pub name: &'static str,
    pub fields: &'static [FieldLayout],
}

impl MessageLayout {
    /// Number of payload bytes needed to decode every field
    pub fn required_len(&self) -> usize {
        self.fields.iter().map(FieldLayout::end).max().unwrap_or(0)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(field) = self.fields.iter().find(|f| f.end() > MAX_DATA_LENGTH) {
            return Err(ConfigError::Invalid(format!(
                "field {} of message {} (0x{:03X}) ends past byte {}",
                field.signal, self.name, self.id, MAX_DATA_LENGTH
            )));
        }
        if let Some(field) = self.fields.iter().find(|f| {
            matches!(f.encoding, FieldEncoding::BeSigned { bits } if bits == 0 || bits > 16)
        }) {
            return Err(ConfigError::Invalid(format!(
                "field {} of message {} (0x{:03X}) has an invalid signed width",
                field.signal, self.name, self.id
            )));
        }
        Ok(())
    }

    /// Publish every field of `frame` to its parameter. Fields past the
    /// end of the payload are skipped.
    pub fn decode(&self, frame: &CanFrame, signals: &VehicleSignals) {
        if frame.dlc() < self.required_len() {
            log::trace!(
                "Short {} frame: {} of {} bytes",
                self.name,
                frame.dlc(),
                self.required_len()
            );
        }
        for field in self.fields {
            match field.extract(frame) {
                Some(raw) => signals.get(field.signal).update(raw),
                None => log::warn!(
                    "Field {} of {} ends past byte {}; skipped",
                    field.signal,
                    self.name,
                    MAX_DATA_LENGTH
                ),
            }
        }
    }
}

/// Hand-written decoder for frames a layout cannot describe
pub type FrameHandler = fn(&CanFrame, &VehicleSignals);

/// One entry of the decoder table
#[derive(Clone, Copy)]
pub enum FrameDecoder {
    Layout(&'static MessageLayout),
    Handler { name: &'static str, handler: FrameHandler },
}

impl fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDecoder::Layout(layout) => f.debug_tuple("Layout").field(layout).finish(),
            FrameDecoder::Handler { name, .. } => {
                f.debug_struct("Handler").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl FrameDecoder {
    pub fn name(&self) -> &'static str {
        match self {
            FrameDecoder::Layout(layout) => layout.name,
            FrameDecoder::Handler { name, .. } => *name,
        }
    }

    fn decode(&self, frame: &CanFrame, signals: &VehicleSignals) {
        match self {
            FrameDecoder::Layout(layout) => layout.decode(frame, signals),
            FrameDecoder::Handler { handler, .. } => handler(frame, signals),
        }
    }
}

/// Sign-extend a value from `bits` bits to 32 bits
///
/// Only the low `bits` bits of `value` are considered. If the top one of them
/// is set, the upper bits are filled with 1s.
pub fn sign_extend(value: u32, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }
    if bits >= 32 {
        return value as i32;
    }

    let shift = 32 - bits as u32;
    ((value << shift) as i32) >> shift
}

/// The vehicle's CAN protocol: every frame type this system understands
pub const VEHICLE_PROTOCOL: &[MessageLayout] = &[
    MessageLayout {
        id: 0x030,
        name: "Brake",
        // 1 of 8 bytes known
        fields: &[FieldLayout::u8(Signal::BrakePedal, 4)],
    },
    MessageLayout {
        id: 0x03A,
        name: "Accelerator",
        fields: &[FieldLayout::u8(Signal::AcceleratorPosition, 5)],
    },
    MessageLayout {
        id: 0x03B,
        name: "Battery",
        // byte 4 is a checksum
        fields: &[
            FieldLayout::be_signed(Signal::BatteryCurrent, 0, 12),
            FieldLayout::be_u16(Signal::BatteryVoltage, 2),
        ],
    },
    MessageLayout {
        id: 0x0B1,
        name: "FrontWheels",
        fields: &[
            FieldLayout::be_u16(Signal::WheelFrontRight, 0),
            FieldLayout::be_u16(Signal::WheelFrontLeft, 2),
        ],
    },
    MessageLayout {
        id: 0x0B3,
        name: "RearWheels",
        fields: &[
            FieldLayout::be_u16(Signal::WheelRearRight, 0),
            FieldLayout::be_u16(Signal::WheelRearLeft, 2),
        ],
    },
    MessageLayout {
        id: 0x0B4,
        name: "Speed",
        fields: &[FieldLayout::be_u16(Signal::Speed, 5)],
    },
    MessageLayout {
        id: 0x3CB,
        name: "BatteryHealth",
        fields: &[
            FieldLayout::u8(Signal::BatteryDischargeLimit, 0),
            FieldLayout::u8(Signal::BatteryChargeLimit, 1),
            FieldLayout::u8(Signal::BatteryDeltaSoc, 2),
            FieldLayout::u8(Signal::BatterySoc, 3),
            FieldLayout::u8(Signal::BatteryTempLowest, 4),
            FieldLayout::u8(Signal::BatteryTempHighest, 5),
        ],
    },
    MessageLayout {
        id: 0x52C,
        name: "EngineCoolant",
        // byte 0 is unknown
        fields: &[FieldLayout::u8(Signal::EngineCoolantTemp, 1)],
    },
];

/// Statistics about the decoder table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    /// Number of frame types with a decoder
    pub num_messages: usize,
    /// Number of fields across all layout decoders
    pub num_fields: usize,
    /// Number of hand-written decoders
    pub num_handlers: usize,
}

/// Arbitration ID to decoder mapping. Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct DecoderTable {
    decoders: HashMap<u32, FrameDecoder>,
}

impl DecoderTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for [`VEHICLE_PROTOCOL`]
    pub fn vehicle() -> Self {
        let mut table = Self::new();
        for layout in VEHICLE_PROTOCOL {
            table.insert(layout.id, FrameDecoder::Layout(layout));
        }
        log::debug!(
            "Decoder table built: {} frame types",
            table.decoders.len()
        );
        table
    }

    /// Register a layout decoder, replacing any decoder for the same id
    pub fn add_layout(
        &mut self,
        layout: &'static MessageLayout,
    ) -> std::result::Result<(), ConfigError> {
        layout.validate()?;
        self.insert(layout.id, FrameDecoder::Layout(layout));
        Ok(())
    }

    /// Register a hand-written decoder, replacing any decoder for the same id
    pub fn add_handler(&mut self, id: u32, name: &'static str, handler: FrameHandler) {
        self.insert(id, FrameDecoder::Handler { name, handler });
    }

    fn insert(&mut self, id: u32, decoder: FrameDecoder) {
        if let Some(previous) = self.decoders.insert(id, decoder) {
            log::warn!(
                "Decoder {} replaces {} for ID 0x{:03X}",
                decoder.name(),
                previous.name(),
                id
            );
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.decoders.contains_key(&id)
    }

    pub fn get(&self, id: u32) -> Option<&FrameDecoder> {
        self.decoders.get(&id)
    }

    /// Decode `frame` into `signals`.
    ///
    /// Returns false, without touching any parameter, if no decoder is
    /// registered for the frame's id.
    pub fn dispatch(&self, frame: &CanFrame, signals: &VehicleSignals) -> bool {
        match self.decoders.get(&frame.id) {
            Some(decoder) => {
                log::trace!("Decoding {} frame {}", decoder.name(), frame);
                decoder.decode(frame, signals);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            num_messages: self.decoders.len(),
            ..TableStats::default()
        };
        for decoder in self.decoders.values() {
            match decoder {
                FrameDecoder::Layout(layout) => stats.num_fields += layout.fields.len(),
                FrameDecoder::Handler { .. } => stats.num_handlers += 1,
            }
        }
        stats
    }
}
