//! Transport-level settings handed to a connector.

use std::time::Duration;

#[cfg(feature = "tls")]
use tonic::transport::ClientTlsConfig;

/// How the transport secures the connection.
///
/// Insecure by default; TLS is an explicit choice behind the `tls` feature.
#[derive(Debug, Clone, Default)]
pub enum TransportSecurity {
    /// Plaintext HTTP/2 (h2c).
    #[default]
    Insecure,
    /// TLS with the given client configuration.
    #[cfg(feature = "tls")]
    Tls(ClientTlsConfig),
}

impl TransportSecurity {
    pub fn is_secure(&self) -> bool {
        match self {
            TransportSecurity::Insecure => false,
            #[cfg(feature = "tls")]
            TransportSecurity::Tls(_) => true,
        }
    }
}

/// Settings a [`Connector`](super::Connector) applies to every attempt.
#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    pub(crate) security: TransportSecurity,
    pub(crate) tcp_keepalive: Option<Duration>,
    pub(crate) http2_keep_alive_interval: Option<Duration>,
}

impl TransportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn security(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn tcp_keepalive(mut self, interval: Duration) -> Self {
        self.tcp_keepalive = Some(interval);
        self
    }

    pub fn http2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.http2_keep_alive_interval = Some(interval);
        self
    }

    pub fn get_security(&self) -> &TransportSecurity {
        &self.security
    }

    pub fn get_tcp_keepalive(&self) -> Option<Duration> {
        self.tcp_keepalive
    }

    pub fn get_http2_keep_alive_interval(&self) -> Option<Duration> {
        self.http2_keep_alive_interval
    }
}
