//! # rscp
//!
//! Client implementation of the RSCP protocol spoken by E3DC-style home
//! energy appliances: the binary frame and tag-length-value codec, the
//! Rijndael-256 session cipher, and an async client that serializes
//! callers onto the appliance's single session.
//!
//! The protocol layer lives in [`rscp_protocol`] and has no I/O; the
//! session layer lives in [`rscp_client`]. This crate re-exports both.
//!
//! ```no_run
//! use rscp::{ClientConfig, SessionCoordinator};
//! use rscp::tags;
//!
//! # async fn demo() -> Result<(), rscp::ClientError> {
//! let config = ClientConfig::new("e3dc.local", "portal@example.com", "secret", "rscp-key");
//! let coordinator = SessionCoordinator::new(config);
//!
//! let mut session = coordinator.acquire().await?;
//! let response = session.request(tags::EMS_REQ_BAT_SOC).await?;
//! println!("battery SoC: {}%", response.u8_by_tag(&[tags::EMS_BAT_SOC]));
//! # Ok(())
//! # }
//! ```

pub use rscp_client::{
    CipherSession, ClientConfig, ClientError, Connection, ConnectionFactory, Connector,
    SessionCoordinator, SessionEvent, SessionGuard, SessionObserver, TracingObserver, Transport,
};
pub use rscp_protocol::{
    default_registry, tags, DataBlock, Frame, Namespace, ProtocolError, ResultCode, Tag, TagDef,
    TagRegistry, Value, WireType, DEFAULT_PORT, MAX_DATA_SIZE,
};
