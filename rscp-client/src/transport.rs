//! Byte transport under the cipher layer.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::ClientError;

/// Anything the connection can move ciphertext over.
///
/// TCP in production; [`tokio::io::duplex`] pipes in tests. The connection
/// owns the transport exclusively, so no split halves are needed.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Opens a TCP transport with a connect timeout and Nagle disabled.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, ClientError> {
    tracing::debug!("Connecting to {}:{}...", host, port);

    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

    stream.set_nodelay(true).ok();

    tracing::debug!("TCP connected");
    Ok(stream)
}
