//! Deserializable connection settings.
//!
//! [`DialConfig`] is the record an external configuration loader fills in.
//! Any serde format works; the loader and its encoders live outside this crate.

use std::time::Duration;

use serde::Deserialize;

use super::options::{CallPolicy, DEFAULT_MAX_RECEIVE_MESSAGE_SIZE};
use crate::endpoint::EndpointAddress;

fn default_wait_for_ready() -> bool {
    true
}

fn default_max_receive_message_size() -> usize {
    DEFAULT_MAX_RECEIVE_MESSAGE_SIZE
}

/// Connection settings supplied by configuration.
///
/// # Example
///
/// ```
/// use grpc_dial::DialConfig;
///
/// let config: DialConfig = serde_json::from_str(
///     r#"{ "endpoint": "svc.internal:443", "call_budget_ms": 2000 }"#,
/// ).unwrap();
/// assert_eq!(config.call_budget().as_secs(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialConfig {
    /// Target address (`host:port` or URI).
    pub endpoint: String,
    /// Establishment budget in milliseconds; by convention also the per-call budget.
    pub call_budget_ms: u64,
    #[serde(default = "default_wait_for_ready")]
    pub wait_for_ready: bool,
    #[serde(default = "default_max_receive_message_size")]
    pub max_receive_message_size: usize,
    #[serde(default)]
    pub max_send_message_size: Option<usize>,
    /// TCP keep-alive in milliseconds.
    #[serde(default)]
    pub tcp_keepalive_ms: Option<u64>,
}

impl DialConfig {
    pub fn endpoint(&self) -> EndpointAddress {
        EndpointAddress::new(self.endpoint.clone())
    }

    pub fn call_budget(&self) -> Duration {
        Duration::from_millis(self.call_budget_ms)
    }

    pub fn tcp_keepalive(&self) -> Option<Duration> {
        self.tcp_keepalive_ms.map(Duration::from_millis)
    }

    /// The call policy described by this config.
    pub fn call_policy(&self) -> CallPolicy {
        let policy = CallPolicy::new()
            .wait_for_ready(self.wait_for_ready)
            .max_receive_message_size(self.max_receive_message_size);
        match self.max_send_message_size {
            Some(limit) => policy.max_send_message_size(limit),
            None => policy,
        }
    }
}
