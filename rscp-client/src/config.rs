//! Client configuration.

use rscp_protocol::DEFAULT_PORT;
use std::time::Duration;

/// Everything the session layer needs to reach and unlock an appliance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Appliance hostname or IP.
    pub host: String,
    /// Appliance TCP port.
    pub port: u16,
    /// Portal account user name.
    pub username: String,
    /// Portal account password.
    pub password: String,
    /// Pre-shared RSCP passphrase configured on the appliance. At most 32
    /// bytes; validated when the cipher session is built.
    pub rscp_key: String,
    /// Socket connect timeout.
    pub connect_timeout: Duration,
    /// Timeout for each response read.
    pub read_timeout: Duration,
    /// How long an acquirer waits for the single connection to become free.
    pub acquire_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        rscp_key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            rscp_key: rscp_key.into(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}
