//! Deadline-bounded connection establishment.

use std::sync::Arc;
use std::time::Duration;

use crate::builder::ConnectionManagerBuilder;
use crate::config::{CallPolicy, DialConfig};
use crate::endpoint::EndpointAddress;
use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::handle::ConnectionHandle;
use crate::interceptor::{StreamChain, UnaryChain, default_unary_chain};
use crate::transport::{Connector, TransportSettings};

/// Establishes and holds one outbound connection.
///
/// [`establish`](Self::establish) is a single-shot primitive: it makes one
/// attempt bounded by the call budget and never retries. Reconnection is the
/// caller's responsibility.
///
/// A manager holds at most one [`ConnectionHandle`]. Establishing again
/// releases the previous handle before the new attempt starts.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use grpc_dial::ConnectionManager;
///
/// let mut manager = ConnectionManager::new();
/// manager.establish("svc.internal:443", Duration::from_secs(2), None).await?;
///
/// let handle = manager.handle().expect("established");
/// let reply = handle.unary_bytes("/echo.v1.Echo/Say", request).await?;
/// ```
#[derive(Debug)]
pub struct ConnectionManager {
    policy: CallPolicy,
    settings: TransportSettings,
    stream_chain: StreamChain,
    connector: Arc<dyn Connector>,
    handle: Option<ConnectionHandle>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Create a manager with the default policy, insecure transport and
    /// tonic connector.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new [`ConnectionManagerBuilder`].
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Create a manager from the policy and transport parts of a config.
    pub fn from_config(config: &DialConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub(crate) fn new_with(
        policy: CallPolicy,
        settings: TransportSettings,
        stream_chain: StreamChain,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            policy,
            settings,
            stream_chain,
            connector,
            handle: None,
        }
    }

    /// Connect to `endpoint` within `budget`.
    ///
    /// Uses `unary_chain` for unary calls, or
    /// [`default_unary_chain`](crate::default_unary_chain) when `None`. The
    /// streaming chain is the one the manager was built with.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or unparsable endpoint or a zero
    ///   budget; nothing is attempted or logged.
    /// - `EstablishmentTimeout` when the budget elapses first. The attempt is
    ///   cancelled.
    /// - `EstablishmentRefused` when the transport fails.
    pub async fn establish(
        &mut self,
        endpoint: impl Into<EndpointAddress>,
        budget: Duration,
        unary_chain: Option<UnaryChain>,
    ) -> Result<(), ConnectionError> {
        let endpoint = endpoint.into();
        if budget.is_zero() {
            return Err(ConnectionError::invalid_argument(
                endpoint.as_str(),
                "call budget must be positive",
            ));
        }
        let target = endpoint
            .to_uri(self.settings.security.is_secure())
            .map_err(|err| ConnectionError::invalid_argument(endpoint.as_str(), err.to_string()))?;

        tracing::info!(
            endpoint = %endpoint,
            budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            "configure service with endpoint: {endpoint}"
        );

        if let Some(previous) = self.handle.take() {
            tracing::debug!(endpoint = %previous.endpoint(), "releasing previous connection");
        }

        let unary_chain = unary_chain.unwrap_or_else(default_unary_chain);

        // Dropping the attempt on expiry cancels it.
        let attempt = self.connector.connect(&target, &self.settings, budget);
        let outcome = tokio::time::timeout(budget, attempt).await;

        let channel = match outcome {
            Ok(Ok(channel)) => channel,
            Ok(Err(err)) => {
                return Err(failed(
                    &endpoint,
                    ConnectionErrorKind::EstablishmentRefused(err),
                ));
            }
            Err(_) => {
                return Err(failed(
                    &endpoint,
                    ConnectionErrorKind::EstablishmentTimeout(budget),
                ));
            }
        };

        self.handle = Some(ConnectionHandle::new(
            channel,
            endpoint,
            unary_chain,
            self.stream_chain.clone(),
            self.policy.clone(),
            budget,
        ));
        Ok(())
    }

    /// The live connection, once established.
    pub fn handle(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    pub fn is_established(&self) -> bool {
        self.handle.is_some()
    }

    /// The budget the current connection was established with.
    pub fn call_budget(&self) -> Option<Duration> {
        self.handle.as_ref().map(ConnectionHandle::call_budget)
    }

    /// Drop the current connection. Returns whether one was held.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                tracing::debug!(endpoint = %handle.endpoint(), "releasing connection");
                true
            }
            None => false,
        }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// The streaming chain attached to every connection.
    pub fn stream_chain(&self) -> &StreamChain {
        &self.stream_chain
    }
}

fn failed(endpoint: &EndpointAddress, kind: ConnectionErrorKind) -> ConnectionError {
    let err = ConnectionError::new(endpoint.as_str(), kind);
    tracing::error!(endpoint = %endpoint, error = %err.kind(), "connect gRPC service {endpoint} failed");
    err
}
