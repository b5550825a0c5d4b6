//! Data block codec.
//!
//! Wire layout of one block:
//!
//! ```text
//! +----------+-----------+------------+-------------+
//! | tag code | wire type | value len  | value bytes |
//! | 4 LE     | 1 byte    | 2 LE       | len bytes   |
//! +----------+-----------+------------+-------------+
//! ```
//!
//! A container value is nothing but further blocks concatenated back to
//! back; there is no element count. Containers decode lazily: a decoded
//! block keeps its raw value bytes and only parses nested blocks when
//! [`DataBlock::children`] or [`DataBlock::value`] asks for them.

use crate::error::ProtocolError;
use crate::error::ResultCode;
use crate::tag::{default_registry, Tag, TagRegistry};
use crate::value::Value;
use crate::wire_type::WireType;
use crate::MAX_DATA_SIZE;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Duration, Utc};

/// Size of the block header (tag + type + length).
pub const BLOCK_HEADER_SIZE: usize = 7;

/// One tagged, typed, length-prefixed unit of protocol data.
///
/// Immutable once built, whether by [`DataBlock::new`] or by decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    tag: Tag,
    wire_type: WireType,
    data: Bytes,
}

impl DataBlock {
    /// Builds a block from a tag and value.
    ///
    /// The wire type defaults to the tag's declared type (or, for a tag the
    /// registry does not know, to the value's natural type); the value is
    /// encoded as-is. Fails when the encoded value exceeds the 16-bit
    /// length field.
    pub fn new(tag: Tag, value: Value) -> Result<Self, ProtocolError> {
        let wire_type = match tag {
            Tag::Known(_) => tag.wire_type(),
            Tag::Unknown(_) => value.wire_type(),
        };
        Self::with_wire_type(tag, wire_type, value)
    }

    /// Builds a block with an explicit wire type override.
    ///
    /// Escape hatch for forward compatibility and for deliberately
    /// malformed test traffic; [`DataBlock::new`] is the normal path.
    pub fn with_wire_type(
        tag: Tag,
        wire_type: WireType,
        value: Value,
    ) -> Result<Self, ProtocolError> {
        let data = Bytes::from(value.encode());
        if data.len() > MAX_DATA_SIZE {
            return Err(ProtocolError::DataTooLarge {
                size: data.len(),
                max: MAX_DATA_SIZE,
            });
        }
        Ok(Self {
            tag,
            wire_type,
            data,
        })
    }

    /// Builds a block directly from raw value bytes.
    pub fn from_raw(tag: Tag, wire_type: WireType, data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() > MAX_DATA_SIZE {
            return Err(ProtocolError::DataTooLarge {
                size: data.len(),
                max: MAX_DATA_SIZE,
            });
        }
        Ok(Self {
            tag,
            wire_type,
            data: Bytes::from(data),
        })
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Raw value bytes, undecoded.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total encoded size, header included.
    pub fn encoded_len(&self) -> usize {
        BLOCK_HEADER_SIZE + self.data.len()
    }

    pub(crate) fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.tag.code());
        buf.put_u8(self.wire_type.code());
        buf.put_u16_le(self.data.len() as u16);
        buf.put_slice(&self.data);
    }

    /// Serializes this block (header + value) to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Decodes a concatenated block stream, consuming the buffer exactly.
    ///
    /// A buffer whose last block does not end precisely at the boundary is
    /// malformed input.
    pub fn decode_stream(
        buf: &[u8],
        registry: &dyn TagRegistry,
    ) -> Result<Vec<DataBlock>, ProtocolError> {
        let mut blocks = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let (block, used) = Self::decode_one(&buf[offset..], registry)?;
            blocks.push(block);
            offset += used;
        }
        Ok(blocks)
    }

    /// Decodes a single block from the front of `buf`, returning it and the
    /// number of bytes consumed.
    pub fn decode_one(
        buf: &[u8],
        registry: &dyn TagRegistry,
    ) -> Result<(DataBlock, usize), ProtocolError> {
        if buf.len() < BLOCK_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: BLOCK_HEADER_SIZE,
                remaining: buf.len(),
            });
        }
        let code = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let wire_type = WireType::from_code(buf[4]);
        let len = u16::from_le_bytes([buf[5], buf[6]]) as usize;
        let remaining = buf.len() - BLOCK_HEADER_SIZE;
        if len > remaining {
            return Err(ProtocolError::LengthOverrun {
                declared: len,
                remaining,
            });
        }
        let block = DataBlock {
            tag: registry.resolve(code),
            wire_type,
            data: Bytes::copy_from_slice(&buf[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + len]),
        };
        Ok((block, BLOCK_HEADER_SIZE + len))
    }

    /// Decodes the stored bytes into a typed [`Value`].
    ///
    /// Fails only on malformed bytes for the stored wire type; containers
    /// are parsed recursively at this point.
    pub fn value_with(&self, registry: &dyn TagRegistry) -> Result<Value, ProtocolError> {
        Value::decode(self.wire_type, &self.data, registry)
    }

    /// [`DataBlock::value_with`] against the built-in registry.
    pub fn value(&self) -> Result<Value, ProtocolError> {
        self.value_with(default_registry())
    }

    /// Nested blocks of a container, decoded on demand.
    ///
    /// Non-container blocks yield an empty list; a malformed embedded
    /// stream is an error.
    pub fn children_with(
        &self,
        registry: &dyn TagRegistry,
    ) -> Result<Vec<DataBlock>, ProtocolError> {
        if !self.wire_type.is_container() {
            return Ok(Vec::new());
        }
        Self::decode_stream(&self.data, registry)
    }

    /// [`DataBlock::children_with`] against the built-in registry.
    pub fn children(&self) -> Result<Vec<DataBlock>, ProtocolError> {
        self.children_with(default_registry())
    }

    // Soft typed accessors: `None` on any mismatch or malformed value, so
    // callers can treat "field missing in this firmware" as routine.

    pub fn as_bool(&self) -> Option<bool> {
        self.value().ok()?.as_bool()
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.value().ok()?.as_u8()
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.value().ok()?.as_i32()
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.value().ok()?.as_u32()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().ok()?.as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value().ok()?.as_u64()
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.value().ok()?.as_f32()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().ok()?.as_f64()
    }

    pub fn as_string(&self) -> Option<String> {
        match self.value().ok()? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self.value().ok()? {
            Value::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        self.value().ok()?.as_timestamp()
    }

    pub fn as_duration(&self) -> Option<Duration> {
        self.value().ok()?.as_duration()
    }

    pub fn as_result_code(&self) -> Option<ResultCode> {
        self.value().ok()?.as_result_code()
    }
}
