//! Configuration for connections and calls.
//!
//! - [`CallPolicy`]: default per-call settings (wait-for-ready, size ceilings)
//! - [`DialConfig`]: the deserializable record a configuration loader supplies

mod dial;
mod options;

pub use dial::DialConfig;
pub use options::{CallPolicy, DEFAULT_MAX_RECEIVE_MESSAGE_SIZE};
