//! Serialized access to the single appliance session.
//!
//! The appliance accepts one RSCP session per portal account, and the
//! chained cipher IVs make interleaved requests on one socket impossible
//! anyway. The coordinator therefore keeps at most one live
//! [`Connection`] in a slot behind an async mutex: acquirers queue for the
//! slot, the winner gets a guard with exclusive use of the session, and a
//! fatal error discards the connection so the next acquirer reconnects
//! and re-authenticates through the factory.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rscp_protocol::{Frame, Tag};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::observer::{SessionObserver, TracingObserver};

/// Produces authenticated connections on demand.
///
/// The coordinator calls this whenever its slot is empty: at first use and
/// after every fatal error.
pub trait ConnectionFactory: Send + Sync {
    fn connect(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Connection, ClientError>> + Send + '_>>;
}

/// Default factory: dials the configured appliance over TCP.
pub struct Connector {
    config: ClientConfig,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl Connector {
    pub fn new(config: ClientConfig, observers: Vec<Arc<dyn SessionObserver>>) -> Self {
        Self { config, observers }
    }
}

impl ConnectionFactory for Connector {
    fn connect(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Connection, ClientError>> + Send + '_>> {
        Box::pin(Connection::establish(
            self.config.clone(),
            self.observers.clone(),
        ))
    }
}

/// Hands out exclusive, time-bounded access to the one live session.
#[derive(Clone)]
pub struct SessionCoordinator {
    slot: Arc<Mutex<Option<Connection>>>,
    factory: Arc<dyn ConnectionFactory>,
    acquire_timeout: std::time::Duration,
}

impl SessionCoordinator {
    /// Coordinator over the standard TCP connector with tracing
    /// observation.
    pub fn new(config: ClientConfig) -> Self {
        let acquire_timeout = config.acquire_timeout;
        let factory = Connector::new(config, vec![Arc::new(TracingObserver)]);
        Self::with_factory(Arc::new(factory), acquire_timeout)
    }

    /// Coordinator over a custom factory (custom observers, in-memory
    /// transports).
    pub fn with_factory(
        factory: Arc<dyn ConnectionFactory>,
        acquire_timeout: std::time::Duration,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            factory,
            acquire_timeout,
        }
    }

    /// Waits for the session slot, connecting first if it is empty.
    ///
    /// Queued acquirers that do not get the slot within the acquisition
    /// timeout fail with [`ClientError::AcquireTimeout`]; the connect and
    /// authentication handshake itself is bounded separately by the
    /// connection's own timeouts.
    pub async fn acquire(&self) -> Result<SessionGuard, ClientError> {
        let mut guard =
            tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.slot).lock_owned())
                .await
                .map_err(|_| {
                    tracing::debug!("session slot busy past the acquisition timeout");
                    ClientError::AcquireTimeout
                })?;

        if guard.is_none() {
            tracing::debug!("session slot empty, connecting");
            *guard = Some(self.factory.connect().await?);
        }
        Ok(SessionGuard { slot: guard })
    }

    /// Closes the live session, if any. The next acquisition reconnects.
    pub async fn disconnect(&self) {
        if let Some(mut conn) = self.slot.lock().await.take() {
            conn.close().await;
        }
    }
}

/// Exclusive use of the session for the guard's lifetime.
///
/// Dropping the guard returns the session to the coordinator. A fatal
/// error on the wire empties the slot instead, forcing the next acquirer
/// through the factory.
#[derive(Debug)]
pub struct SessionGuard {
    slot: OwnedMutexGuard<Option<Connection>>,
}

impl SessionGuard {
    /// Sends one request frame and returns the response.
    pub async fn send(&mut self, frame: &Frame) -> Result<Frame, ClientError> {
        let conn = self.slot.as_mut().ok_or(ClientError::NotConnected)?;
        match conn.send(frame).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_fatal() => {
                tracing::debug!(error = %e, "fatal session error, discarding connection");
                if let Some(mut conn) = self.slot.take() {
                    conn.close().await;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Shorthand for a request frame holding one valueless tag.
    pub async fn request(&mut self, tag: Tag) -> Result<Frame, ClientError> {
        let frame = Frame::request(tag)?;
        self.send(&frame).await
    }

    /// Access level the appliance granted for this session.
    pub fn access_level(&self) -> Option<u8> {
        self.slot.as_ref().map(Connection::access_level)
    }
}
