//! Default call policy applied to every call on a connection.

/// Default ceiling on the size of a received message: 16 MiB.
pub const DEFAULT_MAX_RECEIVE_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Call-level settings attached to a connection at establishment time.
///
/// Every call issued through a [`ConnectionHandle`](crate::ConnectionHandle)
/// uses this policy.
///
/// # Example
///
/// ```
/// use grpc_dial::CallPolicy;
///
/// let policy = CallPolicy::new()
///     .max_receive_message_size(4 * 1024 * 1024)
///     .wait_for_ready(false);
/// assert_eq!(policy.get_max_receive_message_size(), 4 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Wait for the transport to become ready instead of failing fast.
    pub(crate) wait_for_ready: bool,
    /// Maximum size of a decoded response message.
    pub(crate) max_receive_message_size: usize,
    /// Maximum size of an encoded request message. `None` leaves tonic's default.
    pub(crate) max_send_message_size: Option<usize>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            wait_for_ready: true,
            max_receive_message_size: DEFAULT_MAX_RECEIVE_MESSAGE_SIZE,
            max_send_message_size: None,
        }
    }
}

impl CallPolicy {
    /// Create the default policy: wait-for-ready, 16 MiB receive ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether calls wait for the transport to become ready.
    ///
    /// When enabled, a call the transport rejects as `Unavailable` before
    /// sending anything is retried with backoff until its timeout or the call
    /// budget runs out. When disabled, that first `Unavailable` is returned.
    pub fn wait_for_ready(mut self, wait: bool) -> Self {
        self.wait_for_ready = wait;
        self
    }

    /// Set the ceiling on received message size.
    pub fn max_receive_message_size(mut self, limit: usize) -> Self {
        self.max_receive_message_size = limit;
        self
    }

    /// Set the ceiling on sent message size.
    pub fn max_send_message_size(mut self, limit: usize) -> Self {
        self.max_send_message_size = Some(limit);
        self
    }

    pub fn get_wait_for_ready(&self) -> bool {
        self.wait_for_ready
    }

    pub fn get_max_receive_message_size(&self) -> usize {
        self.max_receive_message_size
    }

    pub fn get_max_send_message_size(&self) -> Option<usize> {
        self.max_send_message_size
    }
}
