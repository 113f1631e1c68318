//! Builder for [`ConnectionManager`].
//!
//! Provides a fluent API for configuring the call policy, transport and
//! streaming chain a manager attaches to every connection it establishes.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CallPolicy, DialConfig};
use crate::interceptor::{StreamChain, default_stream_chain};
use crate::manager::ConnectionManager;
use crate::transport::{Connector, TonicConnector, TransportSecurity, TransportSettings};

/// Builder for creating a [`ConnectionManager`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use grpc_dial::{CallPolicy, ConnectionManager};
///
/// let manager = ConnectionManager::builder()
///     .policy(CallPolicy::new().max_receive_message_size(8 * 1024 * 1024))
///     .tcp_keepalive(Duration::from_secs(60))
///     .build();
/// assert!(!manager.is_established());
/// ```
pub struct ConnectionManagerBuilder {
    /// Call policy attached to every connection.
    policy: CallPolicy,
    /// Transport settings for every attempt.
    settings: TransportSettings,
    /// Streaming chain; `None` uses the default.
    stream_chain: Option<StreamChain>,
    /// Performs the connection attempts.
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .field("stream_chain", &self.stream_chain)
            .field("connector", &self.connector)
            .finish()
    }
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManagerBuilder {
    /// Create a builder with the default policy, insecure transport and the
    /// tonic connector.
    pub fn new() -> Self {
        Self {
            policy: CallPolicy::default(),
            settings: TransportSettings::default(),
            stream_chain: None,
            connector: Arc::new(TonicConnector::new()),
        }
    }

    /// Set the call policy attached to established connections.
    pub fn policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how the transport is secured.
    ///
    /// Default is [`TransportSecurity::Insecure`].
    pub fn security(mut self, security: TransportSecurity) -> Self {
        self.settings = self.settings.security(security);
        self
    }

    /// Set TCP keep-alive for connections.
    pub fn tcp_keepalive(mut self, interval: Duration) -> Self {
        self.settings = self.settings.tcp_keepalive(interval);
        self
    }

    /// Set the HTTP/2 keep-alive ping interval.
    pub fn http2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.settings = self.settings.http2_keep_alive_interval(interval);
        self
    }

    /// Replace the streaming interceptor chain.
    ///
    /// Without this, [`default_stream_chain`] is used. A unary chain passed to
    /// [`ConnectionManager::establish`] never affects the streaming chain.
    pub fn stream_chain(mut self, chain: StreamChain) -> Self {
        self.stream_chain = Some(chain);
        self
    }

    /// Use a custom connector instead of [`TonicConnector`].
    pub fn connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Apply the policy and transport parts of a [`DialConfig`].
    ///
    /// The endpoint and budget are passed to `establish`.
    pub fn config(mut self, config: &DialConfig) -> Self {
        self.policy = config.call_policy();
        if let Some(interval) = config.tcp_keepalive() {
            self.settings = self.settings.tcp_keepalive(interval);
        }
        self
    }

    /// Build the ConnectionManager.
    pub fn build(self) -> ConnectionManager {
        ConnectionManager::new_with(
            self.policy,
            self.settings,
            self.stream_chain.unwrap_or_else(default_stream_chain),
            self.connector,
        )
    }
}
