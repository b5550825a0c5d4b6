//! Client error types.

use thiserror::Error;

/// Errors raised by the session layer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] rscp_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("read timeout")]
    Timeout,

    #[error("authentication rejected by appliance")]
    AuthenticationFailed,

    #[error("no connection became free within the acquisition timeout")]
    AcquireTimeout,

    #[error("cipher passphrase too long: {len} bytes (max 32)")]
    KeyTooLong { len: usize },

    #[error("ciphertext length {len} is not a multiple of the cipher block size")]
    InvalidCiphertext { len: usize },
}

impl ClientError {
    /// Whether the current connection must be discarded.
    ///
    /// After any of these the cipher state may be desynchronized from the
    /// peer, so the coordinator closes the connection and the next
    /// acquisition reconnects and re-authenticates.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::ConnectionClosed
                | ClientError::Timeout
                | ClientError::InvalidCiphertext { .. }
        )
    }
}
