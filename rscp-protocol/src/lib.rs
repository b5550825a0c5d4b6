//! # rscp-protocol
//!
//! Wire protocol implementation for RSCP, the binary request/response
//! protocol spoken by home energy-management appliances.
//!
//! This crate provides:
//! - The self-describing data block codec (tag + type + length + value,
//!   with recursive containers)
//! - The frame envelope codec (magic, control bytes, timestamp, length,
//!   optional CRC32 trailer)
//! - The typed value codec for all RSCP wire types
//! - A pluggable tag registry with a built-in catalog subset
//!
//! Everything here is transport- and cipher-agnostic; the encrypted session
//! lives in `rscp-client`.

pub mod block;
pub mod error;
pub mod frame;
pub mod tag;
pub mod value;
pub mod wire_type;

pub use block::{DataBlock, BLOCK_HEADER_SIZE};
pub use error::{ProtocolError, ResultCode};
pub use frame::{Frame, CHECKSUM_SIZE, FRAME_HEADER_SIZE, MAGIC};
pub use tag::{default_registry, defs, tags, Namespace, Tag, TagDef, TagRegistry};
pub use value::Value;
pub use wire_type::WireType;

/// Default TCP port of the appliance.
pub const DEFAULT_PORT: u16 = 5033;

/// Maximum byte length of a block value or a frame data section.
///
/// Both length fields on the wire are 16-bit unsigned.
pub const MAX_DATA_SIZE: usize = u16::MAX as usize;
