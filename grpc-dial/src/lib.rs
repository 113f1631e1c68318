//! # grpc-dial
//!
//! Client-side gRPC connection management on top of tonic.
//!
//! A [`ConnectionManager`] establishes one outbound connection to a remote
//! endpoint within a caller-supplied time budget. The resulting
//! [`ConnectionHandle`] carries:
//!
//! - a unary interceptor chain (caller-supplied or [`default_unary_chain`])
//! - a streaming interceptor chain ([`default_stream_chain`] unless the
//!   builder overrides it)
//! - a [`CallPolicy`]: wait-for-ready and a 16 MiB receive ceiling by default
//!
//! Failures are reported as a [`ConnectionError`] distinguishing invalid
//! arguments, an elapsed budget and a refused transport.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use grpc_dial::ConnectionManager;
//!
//! let mut manager = ConnectionManager::new();
//! manager.establish("svc.internal:443", Duration::from_secs(2), None).await?;
//!
//! let handle = manager.handle().expect("established");
//! let request = handle.request_with_budget(payload);
//! let reply = handle.unary_bytes("/echo.v1.Echo/Say", request).await?;
//! ```
//!
//! ## Modules
//!
//! - [`interceptor`]: chains and the default interceptors
//! - [`transport`]: the connector seam and transport settings

mod builder;
mod codec;
mod config;
mod endpoint;
mod error;
mod handle;
pub mod interceptor;
mod manager;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use builder::ConnectionManagerBuilder;
pub use codec::{RawCodec, RawDecoder, RawEncoder};
pub use config::{CallPolicy, DEFAULT_MAX_RECEIVE_MESSAGE_SIZE, DialConfig};
pub use endpoint::{EndpointAddress, EndpointError};
pub use error::{BoxError, ConnectionError, ConnectionErrorKind};
pub use handle::ConnectionHandle;
pub use interceptor::{
    Interceptor, InterceptorChain, StreamChain, UnaryChain, default_stream_chain,
    default_unary_chain,
};
pub use manager::ConnectionManager;
