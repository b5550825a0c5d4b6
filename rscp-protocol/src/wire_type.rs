//! RSCP wire types.

/// Declared type of a data block value.
///
/// The one-byte type code travels on the wire right after the tag code.
/// Codes this crate does not know about map to `Unknown` and round-trip
/// opaquely together with their raw value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    None,
    Bool,
    Char8,
    UChar8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Double64,
    Bitfield,
    String,
    Container,
    Timestamp,
    ByteArray,
    Error,
    Unknown(u8),
}

impl WireType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => WireType::None,
            0x01 => WireType::Bool,
            0x02 => WireType::Char8,
            0x03 => WireType::UChar8,
            0x04 => WireType::Int16,
            0x05 => WireType::UInt16,
            0x06 => WireType::Int32,
            0x07 => WireType::UInt32,
            0x08 => WireType::Int64,
            0x09 => WireType::UInt64,
            0x0A => WireType::Float32,
            0x0B => WireType::Double64,
            0x0C => WireType::Bitfield,
            0x0D => WireType::String,
            0x0E => WireType::Container,
            0x0F => WireType::Timestamp,
            0x10 => WireType::ByteArray,
            0xFF => WireType::Error,
            other => WireType::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            WireType::None => 0x00,
            WireType::Bool => 0x01,
            WireType::Char8 => 0x02,
            WireType::UChar8 => 0x03,
            WireType::Int16 => 0x04,
            WireType::UInt16 => 0x05,
            WireType::Int32 => 0x06,
            WireType::UInt32 => 0x07,
            WireType::Int64 => 0x08,
            WireType::UInt64 => 0x09,
            WireType::Float32 => 0x0A,
            WireType::Double64 => 0x0B,
            WireType::Bitfield => 0x0C,
            WireType::String => 0x0D,
            WireType::Container => 0x0E,
            WireType::Timestamp => 0x0F,
            WireType::ByteArray => 0x10,
            WireType::Error => 0xFF,
            WireType::Unknown(code) => *code,
        }
    }

    /// Exact value byte length for fixed-width types, `None` for
    /// variable-length ones (String, Container, ByteArray, Unknown).
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            WireType::None => Some(0),
            WireType::Bool | WireType::Char8 | WireType::UChar8 | WireType::Bitfield => Some(1),
            WireType::Int16 | WireType::UInt16 => Some(2),
            WireType::Int32 | WireType::UInt32 | WireType::Float32 | WireType::Error => Some(4),
            WireType::Int64 | WireType::UInt64 | WireType::Double64 => Some(8),
            WireType::Timestamp => Some(12),
            WireType::String | WireType::Container | WireType::ByteArray | WireType::Unknown(_) => {
                None
            }
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, WireType::Container)
    }
}
