//! # rscp-client
//!
//! Session layer for the RSCP appliance protocol.
//!
//! This crate provides:
//! - Async TCP transport with the Rijndael-256 session cipher
//! - Authentication handshake and access-level tracking
//! - A coordinator that serializes callers onto the single live session
//! - Observer hooks for session lifecycle events

pub mod cipher;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use cipher::CipherSession;
pub use config::ClientConfig;
pub use connection::Connection;
pub use coordinator::{ConnectionFactory, Connector, SessionCoordinator, SessionGuard};
pub use error::ClientError;
pub use observer::{SessionEvent, SessionObserver, TracingObserver};
pub use transport::Transport;
