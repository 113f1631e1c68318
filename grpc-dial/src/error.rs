//! Connection establishment error types.
//!
//! This module provides [`ConnectionError`], returned by
//! [`ConnectionManager::establish`](crate::ConnectionManager::establish).

use std::time::Duration;

use tonic::{Code, Status};

/// Boxed error produced by a [`Connector`](crate::transport::Connector).
pub type BoxError = tower::BoxError;

/// Why an establishment attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionErrorKind {
    /// The endpoint or budget was rejected before any attempt was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The budget elapsed before the transport confirmed readiness.
    #[error("deadline of {0:?} elapsed before the connection was ready")]
    EstablishmentTimeout(Duration),

    /// The transport reported the endpoint as unreachable or refused.
    #[error("transport error: {0}")]
    EstablishmentRefused(#[source] BoxError),
}

/// An establishment failure, carrying the endpoint and the proximate cause.
#[derive(Debug, thiserror::Error)]
#[error("connect gRPC service {endpoint} failed: {kind}")]
pub struct ConnectionError {
    endpoint: String,
    #[source]
    kind: ConnectionErrorKind,
}

impl ConnectionError {
    pub(crate) fn new(endpoint: impl Into<String>, kind: ConnectionErrorKind) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind,
        }
    }

    pub(crate) fn invalid_argument(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(endpoint, ConnectionErrorKind::InvalidArgument(message.into()))
    }

    /// The endpoint the attempt targeted.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The classified cause.
    pub fn kind(&self) -> &ConnectionErrorKind {
        &self.kind
    }

    /// Consume the error, returning the classified cause.
    pub fn into_kind(self) -> ConnectionErrorKind {
        self.kind
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::InvalidArgument(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::EstablishmentTimeout(_))
    }

    pub fn is_refused(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::EstablishmentRefused(_))
    }

    /// The gRPC status code that best describes this failure.
    ///
    /// - InvalidArgument: `InvalidArgument`
    /// - EstablishmentTimeout: `DeadlineExceeded`
    /// - EstablishmentRefused: `Unavailable`
    pub fn code(&self) -> Code {
        match self.kind {
            ConnectionErrorKind::InvalidArgument(_) => Code::InvalidArgument,
            ConnectionErrorKind::EstablishmentTimeout(_) => Code::DeadlineExceeded,
            ConnectionErrorKind::EstablishmentRefused(_) => Code::Unavailable,
        }
    }
}

impl From<ConnectionError> for Status {
    fn from(err: ConnectionError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
