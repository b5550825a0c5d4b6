//! Request pipeline observation.
//!
//! Observers are logging/tracing hooks only; they see each stage of the
//! encrypt→send→receive→decrypt→parse cycle and have no effect on control
//! flow. Implementations must be cheap since events fire inline on the
//! request path.

/// The stages of one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request frame is serialized and about to be encrypted.
    BeforeEncrypt { plain_len: usize },
    /// Ciphertext is about to be written to the transport.
    BeforeSend { cipher_len: usize },
    /// The write completed.
    AfterSend { cipher_len: usize },
    /// A complete response ciphertext has been accumulated.
    AfterReceive { cipher_len: usize },
    /// The response decrypted cleanly.
    AfterDecrypt { plain_len: usize },
    /// The response parsed into a frame.
    AfterParse { blocks: usize },
}

/// Callback hook dispatched at each [`SessionEvent`]. Every handler
/// defaults to a no-op.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: SessionEvent) {
        let _ = event;
    }
}

/// Observer that forwards every event to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::BeforeEncrypt { plain_len } => {
                tracing::debug!(plain_len, "encrypting request");
            }
            SessionEvent::BeforeSend { cipher_len } => {
                tracing::debug!(cipher_len, "sending request");
            }
            SessionEvent::AfterSend { cipher_len } => {
                tracing::debug!(cipher_len, "request sent");
            }
            SessionEvent::AfterReceive { cipher_len } => {
                tracing::debug!(cipher_len, "response received");
            }
            SessionEvent::AfterDecrypt { plain_len } => {
                tracing::debug!(plain_len, "response decrypted");
            }
            SessionEvent::AfterParse { blocks } => {
                tracing::debug!(blocks, "response parsed");
            }
        }
    }
}
