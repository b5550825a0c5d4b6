//! Frame envelope codec.
//!
//! Frame layout (18-byte header + data section + optional CRC32 trailer):
//!
//! ```text
//! +-------+---------+-----------+---------+----------+----------+--------+
//! | magic | control | seconds   | nanos   | data len | data     | crc32  |
//! | e3 dc | 2 bytes | 8 LE      | 4 LE    | 2 LE     | n bytes  | 4 LE   |
//! +-------+---------+-----------+---------+----------+----------+--------+
//! ```
//!
//! The second control byte selects whether the CRC32 trailer is present
//! (0x11) or absent (0x10). The CRC covers every preceding byte of the
//! frame. The data length field always equals the exact serialized size of
//! the block stream, which makes the frame self-delimiting; bytes after the
//! frame end (cipher padding) are ignored.

use crate::block::DataBlock;
use crate::error::{ProtocolError, ResultCode};
use crate::tag::{default_registry, Tag, TagRegistry};
use crate::value::Value;
use crate::MAX_DATA_SIZE;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Duration, Utc};

/// Magic bytes opening every frame.
pub const MAGIC: [u8; 2] = [0xE3, 0xDC];

/// First control byte, reserved.
pub const CTRL_RESERVED: u8 = 0x00;

/// Second control byte when a CRC32 trailer follows the data section.
pub const CTRL_WITH_CHECKSUM: u8 = 0x11;

/// Second control byte when no trailer is present.
pub const CTRL_NO_CHECKSUM: u8 = 0x10;

/// Size of the fixed frame header in bytes (2+2+8+4+2 = 18).
pub const FRAME_HEADER_SIZE: usize = 18;

/// Size of the CRC32 trailer.
pub const CHECKSUM_SIZE: usize = 4;

/// A protocol frame: timestamp, checksum flag and an ordered block list.
///
/// Value object; built once, never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    timestamp: DateTime<Utc>,
    checksum: bool,
    blocks: Vec<DataBlock>,
}

impl Frame {
    /// Creates a frame stamped with the current time, checksum enabled.
    pub fn new(blocks: Vec<DataBlock>) -> Self {
        Self {
            timestamp: Utc::now(),
            checksum: true,
            blocks,
        }
    }

    /// Replaces the timestamp (fixtures, clock injection).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Disables the CRC32 trailer.
    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn has_checksum(&self) -> bool {
        self.checksum
    }

    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    /// Encodes the frame. The data length field is always derived from the
    /// serialized block stream, never supplied independently.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut data = BytesMut::new();
        for block in &self.blocks {
            block.encode_into(&mut data);
        }
        if data.len() > MAX_DATA_SIZE {
            return Err(ProtocolError::DataTooLarge {
                size: data.len(),
                max: MAX_DATA_SIZE,
            });
        }

        let total = FRAME_HEADER_SIZE
            + data.len()
            + if self.checksum { CHECKSUM_SIZE } else { 0 };
        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&MAGIC);
        buf.put_u8(CTRL_RESERVED);
        buf.put_u8(if self.checksum {
            CTRL_WITH_CHECKSUM
        } else {
            CTRL_NO_CHECKSUM
        });
        buf.put_i64_le(self.timestamp.timestamp());
        buf.put_i32_le(self.timestamp.timestamp_subsec_nanos() as i32);
        buf.put_u16_le(data.len() as u16);
        buf.put_slice(&data);
        if self.checksum {
            buf.put_u32_le(crc32fast::hash(&buf));
        }
        Ok(buf.to_vec())
    }

    /// Decodes a frame using the built-in registry, without checksum
    /// verification (the reference behavior trusts the transport).
    pub fn decode(buf: &[u8]) -> Result<Frame, ProtocolError> {
        Self::decode_with(buf, default_registry(), false)
    }

    /// Decodes a frame and rejects it on CRC mismatch (hardening mode).
    pub fn decode_verifying(buf: &[u8]) -> Result<Frame, ProtocolError> {
        Self::decode_with(buf, default_registry(), true)
    }

    /// Decodes a frame with a caller-supplied registry.
    ///
    /// Bytes past the end of the frame are ignored; the cipher layer pads
    /// with zeros up to its block boundary.
    pub fn decode_with(
        buf: &[u8],
        registry: &dyn TagRegistry,
        verify_checksum: bool,
    ) -> Result<Frame, ProtocolError> {
        let total = match Self::complete_len(buf) {
            Some(total) => total,
            None => {
                return Err(ProtocolError::Truncated {
                    needed: Self::declared_len(buf).unwrap_or(FRAME_HEADER_SIZE),
                    remaining: buf.len(),
                })
            }
        };
        if buf[0..2] != MAGIC {
            return Err(ProtocolError::InvalidMagic([buf[0], buf[1]]));
        }

        let checksum = buf[3] == CTRL_WITH_CHECKSUM;
        let seconds = i64::from_le_bytes(buf[4..12].try_into().unwrap());
        let nanos = i32::from_le_bytes(buf[12..16].try_into().unwrap());
        let data_end = total - if checksum { CHECKSUM_SIZE } else { 0 };

        if verify_checksum && checksum {
            let expected = u32::from_le_bytes(buf[data_end..total].try_into().unwrap());
            let actual = crc32fast::hash(&buf[..data_end]);
            if actual != expected {
                return Err(ProtocolError::ChecksumMismatch { expected, actual });
            }
        }

        let blocks = DataBlock::decode_stream(&buf[FRAME_HEADER_SIZE..data_end], registry)?;
        let timestamp = u32::try_from(nanos)
            .ok()
            .and_then(|n| DateTime::from_timestamp(seconds, n))
            .unwrap_or_default();

        Ok(Frame {
            timestamp,
            checksum,
            blocks,
        })
    }

    /// Total byte length of the frame at the front of `buf`, or `None` when
    /// more input is needed. Used by readers accumulating from a stream.
    pub fn complete_len(buf: &[u8]) -> Option<usize> {
        let total = Self::declared_len(buf)?;
        (buf.len() >= total).then_some(total)
    }

    fn declared_len(buf: &[u8]) -> Option<usize> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }
        let data_len = u16::from_le_bytes([buf[16], buf[17]]) as usize;
        let trailer = if buf[3] == CTRL_WITH_CHECKSUM {
            CHECKSUM_SIZE
        } else {
            0
        };
        Some(FRAME_HEADER_SIZE + data_len + trailer)
    }

    /// Finds a block by tag path: zero or more ancestor container tags
    /// (outermost first) followed by the target tag.
    ///
    /// Returns `None` when any path element is absent, or when descent is
    /// required through a block that is not a well-formed container. This
    /// is the documented "no such field" contract; it never errors.
    pub fn data_by_tag(&self, path: &[Tag]) -> Option<DataBlock> {
        self.data_by_tag_with(path, default_registry())
    }

    /// [`Frame::data_by_tag`] with a caller-supplied registry.
    pub fn data_by_tag_with(&self, path: &[Tag], registry: &dyn TagRegistry) -> Option<DataBlock> {
        let (&first, mut rest) = path.split_first()?;
        let mut current = self.blocks.iter().find(|b| b.tag() == first)?.clone();
        while let Some((&next, tail)) = rest.split_first() {
            if !current.wire_type().is_container() {
                return None;
            }
            let children = current.children_with(registry).ok()?;
            current = children.into_iter().find(|b| b.tag() == next)?;
            rest = tail;
        }
        Some(current)
    }

    // Default accessors: absent path or mismatched type yields a
    // documented placeholder, not an error. Callers must treat the
    // placeholder as "no such field", not as a valid reading.

    pub fn bool_by_tag(&self, path: &[Tag]) -> bool {
        self.data_by_tag(path)
            .and_then(|b| b.as_bool())
            .unwrap_or(false)
    }

    pub fn u8_by_tag(&self, path: &[Tag]) -> u8 {
        self.data_by_tag(path).and_then(|b| b.as_u8()).unwrap_or(0)
    }

    pub fn i32_by_tag(&self, path: &[Tag]) -> i32 {
        self.data_by_tag(path)
            .and_then(|b| b.as_i32())
            .unwrap_or(0)
    }

    pub fn u32_by_tag(&self, path: &[Tag]) -> u32 {
        self.data_by_tag(path)
            .and_then(|b| b.as_u32())
            .unwrap_or(0)
    }

    pub fn i64_by_tag(&self, path: &[Tag]) -> i64 {
        self.data_by_tag(path)
            .and_then(|b| b.as_i64())
            .unwrap_or(0)
    }

    pub fn u64_by_tag(&self, path: &[Tag]) -> u64 {
        self.data_by_tag(path)
            .and_then(|b| b.as_u64())
            .unwrap_or(0)
    }

    pub fn f32_by_tag(&self, path: &[Tag]) -> f32 {
        self.data_by_tag(path)
            .and_then(|b| b.as_f32())
            .unwrap_or(0.0)
    }

    pub fn f64_by_tag(&self, path: &[Tag]) -> f64 {
        self.data_by_tag(path)
            .and_then(|b| b.as_f64())
            .unwrap_or(0.0)
    }

    pub fn string_by_tag(&self, path: &[Tag]) -> String {
        self.data_by_tag(path)
            .and_then(|b| b.as_string())
            .unwrap_or_default()
    }

    pub fn bytes_by_tag(&self, path: &[Tag]) -> Vec<u8> {
        self.data_by_tag(path)
            .and_then(|b| b.as_bytes())
            .unwrap_or_default()
    }

    /// Defaults to the current instant when the field is absent.
    pub fn timestamp_by_tag(&self, path: &[Tag]) -> DateTime<Utc> {
        self.data_by_tag(path)
            .and_then(|b| b.as_timestamp())
            .unwrap_or_else(Utc::now)
    }

    /// Defaults to the duration between the epoch and now.
    pub fn duration_by_tag(&self, path: &[Tag]) -> Duration {
        self.data_by_tag(path)
            .and_then(|b| b.as_duration())
            .unwrap_or_else(|| Utc::now().signed_duration_since(DateTime::UNIX_EPOCH))
    }

    pub fn container_by_tag(&self, path: &[Tag]) -> Vec<DataBlock> {
        self.data_by_tag(path)
            .and_then(|b| b.children().ok())
            .unwrap_or_default()
    }

    pub fn result_by_tag(&self, path: &[Tag]) -> ResultCode {
        self.data_by_tag(path)
            .and_then(|b| b.as_result_code())
            .unwrap_or(ResultCode::UNKNOWN)
    }

    /// Convenience: single-block request frame for a tag with no payload.
    pub fn request(tag: Tag) -> Result<Frame, ProtocolError> {
        Ok(Frame::new(vec![DataBlock::new(tag, Value::None)?]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::tags;
    use crate::wire_type::WireType;

    /// Checksummed frame holding BAT_DEVICE_NAME = "test" at
    /// 2023-01-01T00:00:00Z.
    const DEVICE_NAME_FRAME: &str =
        "e3dc001100cdb06300000000000000000b000b0080030d0400746573747fd92804";

    fn device_name_frame() -> Frame {
        let block =
            DataBlock::new(tags::BAT_DEVICE_NAME, Value::String("test".to_owned())).unwrap();
        Frame::new(vec![block]).with_timestamp(DateTime::from_timestamp(1_672_531_200, 0).unwrap())
    }

    #[test]
    fn test_encode_known_fixture() {
        let encoded = device_name_frame().encode().unwrap();
        assert_eq!(hex::encode(&encoded), DEVICE_NAME_FRAME);
    }

    #[test]
    fn test_decode_known_fixture() {
        let bytes = hex::decode(DEVICE_NAME_FRAME).unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, device_name_frame());
        assert_eq!(
            frame.string_by_tag(&[tags::BAT_DEVICE_NAME]),
            "test"
        );
    }

    #[test]
    fn test_crc32_reference_value() {
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_trailer_is_crc_of_preceding_bytes() {
        let encoded = device_name_frame().encode().unwrap();
        let trailer = u32::from_le_bytes(encoded[encoded.len() - 4..].try_into().unwrap());
        assert_eq!(trailer, crc32fast::hash(&encoded[..encoded.len() - 4]));
    }

    #[test]
    fn test_roundtrip_with_and_without_checksum() {
        let checked = device_name_frame();
        let unchecked = device_name_frame().without_checksum();
        for frame in [checked, unchecked] {
            let encoded = frame.encode().unwrap();
            let data_len: usize = frame.blocks().iter().map(|b| b.encoded_len()).sum();
            let trailer = if frame.has_checksum() { CHECKSUM_SIZE } else { 0 };
            assert_eq!(encoded.len(), FRAME_HEADER_SIZE + data_len + trailer);
            assert_eq!(
                u16::from_le_bytes([encoded[16], encoded[17]]) as usize,
                data_len
            );
            let decoded = Frame::decode(&encoded).unwrap();
            assert_eq!(decoded.blocks(), frame.blocks());
            assert_eq!(decoded.has_checksum(), frame.has_checksum());
        }
    }

    #[test]
    fn test_trailing_padding_ignored() {
        let mut bytes = device_name_frame().encode().unwrap();
        // Cipher pads with zeros up to its block boundary.
        bytes.extend_from_slice(&[0x00; 31]);
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, device_name_frame());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = device_name_frame().encode().unwrap();
        bytes[0] = 0xAA;
        assert!(matches!(
            Frame::decode(&bytes).unwrap_err(),
            ProtocolError::InvalidMagic([0xAA, 0xDC])
        ));
    }

    #[test]
    fn test_truncated_header_and_data() {
        assert!(matches!(
            Frame::decode(&[0xE3, 0xDC, 0x00]).unwrap_err(),
            ProtocolError::Truncated { .. }
        ));
        let bytes = device_name_frame().encode().unwrap();
        assert!(matches!(
            Frame::decode(&bytes[..bytes.len() - 6]).unwrap_err(),
            ProtocolError::Truncated { .. }
        ));
    }

    #[test]
    fn test_unknown_control_byte_does_not_crash() {
        let mut bytes = device_name_frame().without_checksum().encode().unwrap();
        bytes[3] = 0x42;
        let frame = Frame::decode(&bytes).unwrap();
        assert!(!frame.has_checksum());
        assert_eq!(frame.blocks(), device_name_frame().blocks());
    }

    #[test]
    fn test_checksum_verification_opt_in() {
        let mut bytes = device_name_frame().encode().unwrap();
        let corrupted = bytes.len() - 1;
        bytes[corrupted] ^= 0xFF;
        // Permissive decode trusts the transport.
        assert!(Frame::decode(&bytes).is_ok());
        assert!(matches!(
            Frame::decode_verifying(&bytes).unwrap_err(),
            ProtocolError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_complete_len() {
        let bytes = device_name_frame().encode().unwrap();
        assert_eq!(Frame::complete_len(&bytes), Some(bytes.len()));
        assert_eq!(Frame::complete_len(&bytes[..bytes.len() - 1]), None);
        assert_eq!(Frame::complete_len(&[]), None);
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0; 13]);
        assert_eq!(Frame::complete_len(&padded), Some(bytes.len()));
    }

    fn nested_frame() -> Frame {
        let soc = DataBlock::new(tags::WB_SOC, Value::UChar8(55)).unwrap();
        let inner = DataBlock::new(tags::WB_DATA, Value::Container(vec![soc])).unwrap();
        let outer = DataBlock::new(tags::BAT_DATA, Value::Container(vec![inner])).unwrap();
        let rsoc = DataBlock::new(tags::BAT_RSOC, Value::Float32(93.5)).unwrap();
        Frame::new(vec![outer, rsoc])
    }

    #[test]
    fn test_path_lookup_at_each_depth() {
        let frame = nested_frame();
        assert_eq!(
            frame.data_by_tag(&[tags::BAT_RSOC]).unwrap().as_f32(),
            Some(93.5)
        );
        assert_eq!(
            frame
                .data_by_tag(&[tags::BAT_DATA, tags::WB_DATA])
                .unwrap()
                .tag(),
            tags::WB_DATA
        );
        assert_eq!(
            frame
                .data_by_tag(&[tags::BAT_DATA, tags::WB_DATA, tags::WB_SOC])
                .unwrap()
                .as_u8(),
            Some(55)
        );
    }

    #[test]
    fn test_path_lookup_absent() {
        let frame = nested_frame();
        assert!(frame.data_by_tag(&[tags::EMS_POWER_PV]).is_none());
        assert!(frame
            .data_by_tag(&[tags::BAT_DATA, tags::BAT_RSOC])
            .is_none());
        // Descent through a non-container fails softly.
        assert!(frame
            .data_by_tag(&[tags::BAT_RSOC, tags::WB_SOC])
            .is_none());
        assert!(frame.data_by_tag(&[]).is_none());
    }

    #[test]
    fn test_default_accessors_on_absent_path() {
        let frame = nested_frame();
        let missing = &[tags::EMS_POWER_GRID];
        assert_eq!(frame.i32_by_tag(missing), 0);
        assert_eq!(frame.u64_by_tag(missing), 0);
        assert_eq!(frame.f64_by_tag(missing), 0.0);
        assert_eq!(frame.string_by_tag(missing), "");
        assert!(!frame.bool_by_tag(missing));
        assert_eq!(frame.bytes_by_tag(missing), Vec::<u8>::new());
        assert_eq!(frame.container_by_tag(missing), Vec::new());
        assert_eq!(frame.result_by_tag(missing), ResultCode::UNKNOWN);
        let now = Utc::now();
        let default_ts = frame.timestamp_by_tag(missing);
        assert!((default_ts - now).num_seconds().abs() < 60);
        let default_dur = frame.duration_by_tag(missing);
        assert!((default_dur - now.signed_duration_since(DateTime::UNIX_EPOCH))
            .num_seconds()
            .abs()
            < 60);
    }

    #[test]
    fn test_result_code_accessor() {
        let err = DataBlock::with_wire_type(
            tags::RSCP_GENERAL_ERROR,
            WireType::Error,
            Value::Error(ResultCode::AccessDenied),
        )
        .unwrap();
        let frame = Frame::new(vec![err]);
        assert_eq!(
            frame.result_by_tag(&[tags::RSCP_GENERAL_ERROR]),
            ResultCode::AccessDenied
        );
    }

    #[test]
    fn test_request_helper() {
        let frame = Frame::request(tags::EMS_REQ_POWER_PV).unwrap();
        assert_eq!(frame.blocks().len(), 1);
        assert_eq!(frame.blocks()[0].wire_type(), WireType::None);
        assert_eq!(frame.blocks()[0].data().len(), 0);
    }
}
