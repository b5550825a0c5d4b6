//! A single authenticated session with the appliance.

use std::sync::Arc;

use rscp_protocol::{tags, DataBlock, Frame, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::cipher::{CipherSession, BLOCK_SIZE};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::observer::{SessionEvent, SessionObserver};
use crate::transport::{connect_tcp, Transport};

/// Read buffer size for socket reads (8 KiB).
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// One TCP connection, its cipher state, and the authenticated level.
///
/// RSCP is strict request/response: a frame goes out, exactly one frame
/// comes back, and the per-direction IV chains tie both directions to this
/// socket. The connection therefore owns its transport exclusively and is
/// driven through `&mut self`; sharing happens one level up in the
/// [`SessionCoordinator`](crate::SessionCoordinator).
pub struct Connection {
    transport: Box<dyn Transport>,
    cipher: CipherSession,
    /// Ciphertext accumulated across socket reads.
    pending: Vec<u8>,
    config: ClientConfig,
    observers: Vec<Arc<dyn SessionObserver>>,
    access_level: u8,
}

impl Connection {
    /// Dials the configured appliance and authenticates.
    pub async fn establish(
        config: ClientConfig,
        observers: Vec<Arc<dyn SessionObserver>>,
    ) -> Result<Self, ClientError> {
        let stream = connect_tcp(&config.host, config.port, config.connect_timeout).await?;
        Self::over(Box::new(stream), config, observers).await
    }

    /// Authenticates over an already-open transport.
    ///
    /// The cipher session starts fresh here: both IV registers match the
    /// appliance's initial state only on a brand-new socket, so a transport
    /// must never be reused across `Connection` values.
    pub async fn over(
        transport: Box<dyn Transport>,
        config: ClientConfig,
        observers: Vec<Arc<dyn SessionObserver>>,
    ) -> Result<Self, ClientError> {
        let cipher = CipherSession::new(&config.rscp_key)?;
        let mut conn = Self {
            transport,
            cipher,
            pending: Vec::new(),
            config,
            observers,
            access_level: 0,
        };
        conn.authenticate().await?;
        Ok(conn)
    }

    fn emit(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    /// Sends the authentication container and checks the granted level.
    async fn authenticate(&mut self) -> Result<(), ClientError> {
        tracing::debug!(username = %self.config.username, "authenticating");
        let request = Frame::new(vec![DataBlock::new(
            tags::RSCP_REQ_AUTHENTICATION,
            Value::Container(vec![
                DataBlock::new(
                    tags::RSCP_AUTHENTICATION_USER,
                    Value::String(self.config.username.clone()),
                )?,
                DataBlock::new(
                    tags::RSCP_AUTHENTICATION_PASSWORD,
                    Value::String(self.config.password.clone()),
                )?,
            ]),
        )?]);

        let response = self.send(&request).await?;

        if let Some(block) = response.data_by_tag(&[tags::RSCP_GENERAL_ERROR]) {
            if let Some(code) = block.as_result_code() {
                tracing::warn!(%code, "appliance rejected authentication");
            }
            return Err(ClientError::AuthenticationFailed);
        }

        // The appliance answers RSCP_AUTHENTICATION with the granted
        // access level; level 0 means the credentials were rejected.
        let level = response
            .data_by_tag(&[tags::RSCP_AUTHENTICATION])
            .and_then(|b| b.as_u8())
            .unwrap_or(0);
        if level == 0 {
            tracing::debug!("authentication rejected");
            return Err(ClientError::AuthenticationFailed);
        }

        self.access_level = level;
        tracing::debug!(access_level = level, "authenticated");
        Ok(())
    }

    /// Sends one request frame and waits for the matching response.
    pub async fn send(&mut self, frame: &Frame) -> Result<Frame, ClientError> {
        let plaintext = frame.encode()?;
        self.emit(SessionEvent::BeforeEncrypt {
            plain_len: plaintext.len(),
        });
        let ciphertext = self.cipher.encrypt(&plaintext);

        self.emit(SessionEvent::BeforeSend {
            cipher_len: ciphertext.len(),
        });
        self.transport.write_all(&ciphertext).await?;
        self.transport.flush().await?;
        self.emit(SessionEvent::AfterSend {
            cipher_len: ciphertext.len(),
        });
        tracing::debug!(
            plain = plaintext.len(),
            cipher = ciphertext.len(),
            "request sent"
        );

        let response_bytes = tokio::time::timeout(self.config.read_timeout, self.read_frame())
            .await
            .map_err(|_| {
                tracing::debug!("response timeout");
                ClientError::Timeout
            })??;
        self.emit(SessionEvent::AfterDecrypt {
            plain_len: response_bytes.len(),
        });

        let response = Frame::decode(&response_bytes)?;
        self.emit(SessionEvent::AfterParse {
            blocks: response.blocks().len(),
        });
        Ok(response)
    }

    /// Reads until the accumulated ciphertext decrypts to a complete frame,
    /// then commits the decrypt.
    ///
    /// Ciphertext length says nothing about frame length, so each time the
    /// buffer reaches a block boundary the bytes are decrypted *without*
    /// advancing the IV register and probed for frame completeness. Only a
    /// complete frame triggers the stateful decrypt.
    async fn read_frame(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if !self.pending.is_empty() && self.pending.len() % BLOCK_SIZE == 0 {
                let preview = self.cipher.preview_decrypt(&self.pending)?;
                if Frame::complete_len(&preview).is_some() {
                    let ciphertext = std::mem::take(&mut self.pending);
                    self.emit(SessionEvent::AfterReceive {
                        cipher_len: ciphertext.len(),
                    });
                    return self.cipher.decrypt(&ciphertext);
                }
            }

            let n = self.transport.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("connection closed (0 bytes)");
                return Err(ClientError::ConnectionClosed);
            }
            tracing::debug!(bytes = n, buffered = self.pending.len() + n, "read");
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Access level the appliance granted at authentication.
    pub fn access_level(&self) -> u8 {
        self.access_level
    }

    /// Shuts the transport down.
    pub async fn close(&mut self) {
        let _ = self.transport.shutdown().await;
        tracing::debug!("connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("access_level", &self.access_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;
    use crate::testutil::{spawn_appliance, spawn_appliance_mute, test_config, PASSWORD, USER};
    use rscp_protocol::ResultCode;
    use std::sync::Mutex;
    use tokio_test::assert_ok;
    use std::time::Duration;

    async fn connect_emulated() -> Connection {
        let (client_end, server_end) = tokio::io::duplex(4096);
        spawn_appliance(server_end);
        Connection::over(
            Box::new(client_end),
            test_config(),
            vec![Arc::new(TracingObserver)],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_authenticates_and_reports_level() {
        let conn = connect_emulated().await;
        assert_eq!(conn.access_level(), 10);
    }

    #[tokio::test]
    async fn test_bad_credentials_rejected() {
        let (client_end, server_end) = tokio::io::duplex(4096);
        spawn_appliance(server_end);
        let mut config = test_config();
        config.password = "wrong".into();
        let err = Connection::over(Box::new(client_end), config, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_scalar_request_response() {
        let mut conn = connect_emulated().await;
        let response = conn
            .send(&Frame::request(tags::EMS_REQ_BAT_SOC).unwrap())
            .await
            .unwrap();
        assert_eq!(response.u8_by_tag(&[tags::EMS_BAT_SOC]), 73);
    }

    #[tokio::test]
    async fn test_container_request_response() {
        let mut conn = connect_emulated().await;
        let request = Frame::new(vec![DataBlock::new(
            tags::BAT_REQ_DATA,
            Value::Container(vec![
                DataBlock::new(tags::BAT_INDEX, Value::UInt16(0)).unwrap()
            ]),
        )
        .unwrap()]);
        let response = conn.send(&request).await.unwrap();
        let rsoc = response
            .data_by_tag(&[tags::BAT_DATA, tags::BAT_RSOC])
            .and_then(|b| b.as_f32())
            .unwrap();
        assert!((rsoc - 73.5).abs() < f32::EPSILON);
        assert_eq!(
            response.string_by_tag(&[tags::BAT_DATA, tags::BAT_DEVICE_NAME]),
            "BAT_1"
        );
    }

    #[tokio::test]
    async fn test_sequential_requests_keep_cipher_sync() {
        // The chained IVs only stay aligned if both sides advance in
        // lockstep; ten round trips on one session exercise that.
        let mut conn = connect_emulated().await;
        for _ in 0..10 {
            let response = tokio_test::assert_ok!(
                conn.send(&Frame::request(tags::INFO_REQ_MAC_ADDRESS).unwrap())
                    .await
            );
            assert_eq!(
                response.string_by_tag(&[tags::INFO_MAC_ADDRESS]),
                "00:11:22:33:44:55"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_request_yields_error_block() {
        let mut conn = connect_emulated().await;
        let response = conn
            .send(&Frame::request(tags::EMS_REQ_POWER_PV).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.result_by_tag(&[tags::RSCP_GENERAL_ERROR]),
            ResultCode::UnknownTag
        );
    }

    #[tokio::test]
    async fn test_unresponsive_peer_times_out() {
        // The appliance answers the authentication frame, then swallows
        // every further request without replying.
        let (client_end, server_end) = tokio::io::duplex(4096);
        spawn_appliance_mute(server_end, 1);
        let config = test_config().with_read_timeout(Duration::from_millis(100));
        let mut conn = Connection::over(Box::new(client_end), config, Vec::new())
            .await
            .unwrap();

        let err = conn
            .send(&Frame::request(tags::EMS_REQ_BAT_SOC).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
        // A timed-out session is out of cipher sync and must be discarded.
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_peer_close_fails_the_send() {
        let mut conn = connect_emulated().await;
        // Shutting our write side makes the emulator see EOF and exit,
        // which closes its end of the pipe.
        conn.close().await;
        let err = conn
            .send(&Frame::request(tags::EMS_REQ_BAT_SOC).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Io(_) | ClientError::ConnectionClosed
        ));
    }

    struct Recorder(Mutex<Vec<SessionEvent>>);

    impl SessionObserver for Recorder {
        fn on_event(&self, event: SessionEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_observers_see_each_pipeline_stage() {
        let (client_end, server_end) = tokio::io::duplex(4096);
        spawn_appliance(server_end);
        let observer = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut conn = Connection::over(
            Box::new(client_end),
            test_config(),
            vec![Arc::clone(&observer) as Arc<dyn SessionObserver>],
        )
        .await
        .unwrap();
        observer.0.lock().unwrap().clear();

        conn.send(&Frame::request(tags::EMS_REQ_BAT_SOC).unwrap())
            .await
            .unwrap();

        let seen = observer.0.lock().unwrap();
        // One cycle fires every stage exactly once, in pipeline order.
        let stages: Vec<_> = seen
            .iter()
            .map(|e| std::mem::discriminant(e))
            .collect();
        let expected = [
            std::mem::discriminant(&SessionEvent::BeforeEncrypt { plain_len: 0 }),
            std::mem::discriminant(&SessionEvent::BeforeSend { cipher_len: 0 }),
            std::mem::discriminant(&SessionEvent::AfterSend { cipher_len: 0 }),
            std::mem::discriminant(&SessionEvent::AfterReceive { cipher_len: 0 }),
            std::mem::discriminant(&SessionEvent::AfterDecrypt { plain_len: 0 }),
            std::mem::discriminant(&SessionEvent::AfterParse { blocks: 0 }),
        ];
        assert_eq!(stages, expected);
        assert!(seen
            .iter()
            .any(|e| matches!(e, SessionEvent::AfterParse { blocks: 1 })));
    }

    #[test]
    fn test_emulated_credentials_are_fixtures() {
        let config = test_config();
        assert_eq!(config.username, USER);
        assert_eq!(config.password, PASSWORD);
    }
}
