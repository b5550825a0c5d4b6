//! Protocol error types and appliance result codes.

use crate::wire_type::WireType;
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
///
/// All of these indicate malformed input (or oversize output) and are always
/// surfaced to the caller; "field absent" and "wrong type for accessor" are
/// deliberately not errors (see the typed accessors on
/// [`Frame`](crate::Frame)).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected e3dc, got {}", hex::encode(.0))]
    InvalidMagic([u8; 2]),

    #[error("truncated input: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("block value length {declared} runs past end of buffer ({remaining} bytes remaining)")]
    LengthOverrun { declared: usize, remaining: usize },

    #[error("invalid value length for {wire_type:?}: expected {expected}, got {actual}")]
    InvalidValueLength {
        wire_type: WireType,
        expected: usize,
        actual: usize,
    },

    #[error("data section too large: {size} bytes (max {max})")]
    DataTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Result codes carried in Error-typed data blocks.
///
/// The appliance answers a request it cannot serve with a block of wire type
/// `Error` whose 4-byte value is one of these codes. Codes this crate does
/// not know about decode to `Unknown` and re-encode unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    NotHandled,
    AccessDenied,
    Format,
    Again,
    OutOfBounds,
    NotAvailable,
    UnknownTag,
    AlreadyInUse,
    Unknown(u32),
}

impl ResultCode {
    /// The "no such field" placeholder returned by default accessors.
    pub const UNKNOWN: ResultCode = ResultCode::Unknown(u32::MAX);

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResultCode::Success,
            1 => ResultCode::NotHandled,
            2 => ResultCode::AccessDenied,
            3 => ResultCode::Format,
            4 => ResultCode::Again,
            5 => ResultCode::OutOfBounds,
            6 => ResultCode::NotAvailable,
            7 => ResultCode::UnknownTag,
            8 => ResultCode::AlreadyInUse,
            other => ResultCode::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::NotHandled => 1,
            ResultCode::AccessDenied => 2,
            ResultCode::Format => 3,
            ResultCode::Again => 4,
            ResultCode::OutOfBounds => 5,
            ResultCode::NotAvailable => 6,
            ResultCode::UnknownTag => 7,
            ResultCode::AlreadyInUse => 8,
            ResultCode::Unknown(code) => *code,
        }
    }

    /// Returns whether the request may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResultCode::Again | ResultCode::AlreadyInUse)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Success => write!(f, "SUCCESS"),
            ResultCode::NotHandled => write!(f, "ERR_NOT_HANDLED"),
            ResultCode::AccessDenied => write!(f, "ERR_ACCESS_DENIED"),
            ResultCode::Format => write!(f, "ERR_FORMAT"),
            ResultCode::Again => write!(f, "ERR_AGAIN"),
            ResultCode::OutOfBounds => write!(f, "ERR_OUT_OF_BOUNDS"),
            ResultCode::NotAvailable => write!(f, "ERR_NOT_AVAILABLE"),
            ResultCode::UnknownTag => write!(f, "ERR_UNKNOWN_TAG"),
            ResultCode::AlreadyInUse => write!(f, "ERR_ALREADY_IN_USE"),
            ResultCode::Unknown(code) => write!(f, "ERR_UNKNOWN {code:#010x}"),
        }
    }
}
