//! Transport layer for gRPC connections.
//!
//! This module provides the [`Connector`] seam the
//! [`ConnectionManager`](crate::ConnectionManager) attempts connections
//! through, and [`TonicConnector`], the implementation backed by
//! [`tonic::transport::Endpoint`].
//!
//! # Feature Flags
//!
//! - `tls` - Enables [`TransportSecurity::Tls`] (ring + native roots)
//!
//! # Example
//!
//! ```ignore
//! use grpc_dial::transport::{TransportSecurity, TransportSettings};
//! use tonic::transport::ClientTlsConfig;
//!
//! let settings = TransportSettings::new()
//!     .security(TransportSecurity::Tls(ClientTlsConfig::new().with_native_roots()));
//! ```

mod connector;
mod settings;

pub use connector::{Connector, TonicConnector, build_endpoint};
pub use settings::{TransportSecurity, TransportSettings};

#[cfg(feature = "tls")]
pub use tonic::transport::ClientTlsConfig;
