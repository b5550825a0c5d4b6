//! Typed values and their byte-level codec.
//!
//! Everything on the wire is little-endian. Strings are raw UTF-8 with no
//! terminator or length prefix (the enclosing block header carries the
//! length), timestamps are 8 bytes of epoch seconds plus 4 bytes of
//! nanoseconds, and values of an unrecognized wire type pass through as
//! opaque bytes so newer firmware never breaks the parse.

use crate::block::DataBlock;
use crate::error::{ProtocolError, ResultCode};
use crate::tag::TagRegistry;
use crate::wire_type::WireType;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A decoded (or to-be-encoded) block value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Char8(i8),
    UChar8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Double64(f64),
    /// Raw byte; bit tests are a caller concern.
    Bitfield(u8),
    String(String),
    Container(Vec<DataBlock>),
    Timestamp { seconds: i64, nanos: i32 },
    ByteArray(Vec<u8>),
    Error(ResultCode),
    /// Value of a wire type this crate does not know; round-trips unchanged.
    Unknown { type_code: u8, bytes: Vec<u8> },
}

impl Value {
    /// The wire type this value naturally encodes as.
    pub fn wire_type(&self) -> WireType {
        match self {
            Value::None => WireType::None,
            Value::Bool(_) => WireType::Bool,
            Value::Char8(_) => WireType::Char8,
            Value::UChar8(_) => WireType::UChar8,
            Value::Int16(_) => WireType::Int16,
            Value::UInt16(_) => WireType::UInt16,
            Value::Int32(_) => WireType::Int32,
            Value::UInt32(_) => WireType::UInt32,
            Value::Int64(_) => WireType::Int64,
            Value::UInt64(_) => WireType::UInt64,
            Value::Float32(_) => WireType::Float32,
            Value::Double64(_) => WireType::Double64,
            Value::Bitfield(_) => WireType::Bitfield,
            Value::String(_) => WireType::String,
            Value::Container(_) => WireType::Container,
            Value::Timestamp { .. } => WireType::Timestamp,
            Value::ByteArray(_) => WireType::ByteArray,
            Value::Error(_) => WireType::Error,
            Value::Unknown { type_code, .. } => WireType::Unknown(*type_code),
        }
    }

    pub(crate) fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Value::None => {}
            Value::Bool(v) => buf.put_u8(if *v { 0xFF } else { 0x00 }),
            Value::Char8(v) => buf.put_i8(*v),
            Value::UChar8(v) => buf.put_u8(*v),
            Value::Int16(v) => buf.put_i16_le(*v),
            Value::UInt16(v) => buf.put_u16_le(*v),
            Value::Int32(v) => buf.put_i32_le(*v),
            Value::UInt32(v) => buf.put_u32_le(*v),
            Value::Int64(v) => buf.put_i64_le(*v),
            Value::UInt64(v) => buf.put_u64_le(*v),
            Value::Float32(v) => buf.put_f32_le(*v),
            Value::Double64(v) => buf.put_f64_le(*v),
            Value::Bitfield(v) => buf.put_u8(*v),
            Value::String(v) => buf.put_slice(v.as_bytes()),
            Value::Container(blocks) => {
                for block in blocks {
                    block.encode_into(buf);
                }
            }
            Value::Timestamp { seconds, nanos } => {
                buf.put_i64_le(*seconds);
                buf.put_i32_le(*nanos);
            }
            Value::ByteArray(v) => buf.put_slice(v),
            Value::Error(code) => buf.put_u32_le(code.code()),
            Value::Unknown { bytes, .. } => buf.put_slice(bytes),
        }
    }

    /// Serializes this value to its raw wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Decodes raw value bytes according to a declared wire type.
    ///
    /// Fails only on a length that does not match the fixed width of the
    /// declared type, on a malformed embedded block stream (containers), or
    /// on invalid UTF-8 in a string value.
    pub fn decode(
        wire_type: WireType,
        data: &[u8],
        registry: &dyn TagRegistry,
    ) -> Result<Value, ProtocolError> {
        if let Some(expected) = wire_type.fixed_len() {
            if data.len() != expected {
                return Err(ProtocolError::InvalidValueLength {
                    wire_type,
                    expected,
                    actual: data.len(),
                });
            }
        }

        let value = match wire_type {
            WireType::None => Value::None,
            WireType::Bool => Value::Bool(data[0] != 0x00),
            WireType::Char8 => Value::Char8(data[0] as i8),
            WireType::UChar8 => Value::UChar8(data[0]),
            WireType::Int16 => Value::Int16(i16::from_le_bytes([data[0], data[1]])),
            WireType::UInt16 => Value::UInt16(u16::from_le_bytes([data[0], data[1]])),
            WireType::Int32 => Value::Int32(i32::from_le_bytes(data.try_into().unwrap())),
            WireType::UInt32 => Value::UInt32(u32::from_le_bytes(data.try_into().unwrap())),
            WireType::Int64 => Value::Int64(i64::from_le_bytes(data.try_into().unwrap())),
            WireType::UInt64 => Value::UInt64(u64::from_le_bytes(data.try_into().unwrap())),
            WireType::Float32 => Value::Float32(f32::from_le_bytes(data.try_into().unwrap())),
            WireType::Double64 => Value::Double64(f64::from_le_bytes(data.try_into().unwrap())),
            WireType::Bitfield => Value::Bitfield(data[0]),
            WireType::String => Value::String(
                std::str::from_utf8(data)
                    .map_err(|_| ProtocolError::InvalidUtf8)?
                    .to_owned(),
            ),
            WireType::Container => Value::Container(DataBlock::decode_stream(data, registry)?),
            WireType::Timestamp => Value::Timestamp {
                seconds: i64::from_le_bytes(data[..8].try_into().unwrap()),
                nanos: i32::from_le_bytes(data[8..].try_into().unwrap()),
            },
            WireType::ByteArray => Value::ByteArray(data.to_vec()),
            WireType::Error => {
                Value::Error(ResultCode::from_code(u32::from_le_bytes(
                    data.try_into().unwrap(),
                )))
            }
            WireType::Unknown(type_code) => Value::Unknown {
                type_code,
                bytes: data.to_vec(),
            },
        };
        Ok(value)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Value::Char8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::UChar8(v) | Value::Bitfield(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::Int16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::UInt16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&[DataBlock]> {
        match self {
            Value::Container(blocks) => Some(blocks),
            _ => None,
        }
    }

    /// The timestamp as an absolute instant.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp { seconds, nanos } => {
                let nanos = u32::try_from(*nanos).ok()?;
                DateTime::from_timestamp(*seconds, nanos)
            }
            _ => None,
        }
    }

    /// The timestamp as a duration since the epoch.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Timestamp { seconds, nanos } => Duration::try_seconds(*seconds)?
                .checked_add(&Duration::nanoseconds(*nanos as i64)),
            _ => None,
        }
    }

    pub fn as_result_code(&self) -> Option<ResultCode> {
        match self {
            Value::Error(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("<none>"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char8(v) => write!(f, "{v}"),
            Value::UChar8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Double64(v) => write!(f, "{v}"),
            Value::Bitfield(v) => write!(f, "{v:#010b}"),
            Value::String(v) => f.write_str(v),
            Value::Container(blocks) => write!(f, "<container: {} blocks>", blocks.len()),
            Value::Timestamp { seconds, nanos } => write!(f, "{seconds}s+{nanos}ns"),
            Value::ByteArray(v) => f.write_str(&hex::encode(v)),
            Value::Error(code) => write!(f, "{code}"),
            Value::Unknown { type_code, bytes } => {
                write!(f, "<unknown type {type_code:#04x}: {}>", hex::encode(bytes))
            }
        }
    }
}
