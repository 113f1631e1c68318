//! Endpoint addresses.

use std::fmt;

use http::Uri;
use http::uri::InvalidUri;

/// Why an [`EndpointAddress`] could not be turned into a URI.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("endpoint must not be empty")]
    Empty,

    #[error("invalid endpoint {address:?}: {source}")]
    InvalidUri {
        address: String,
        #[source]
        source: InvalidUri,
    },

    #[error("invalid endpoint {0:?}: missing host")]
    MissingHost(String),
}

/// An opaque identifier for the remote target.
///
/// Either `host:port` (a scheme is added when the address is turned into a
/// URI) or a full URI such as `http://svc.internal:8080`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress(String);

impl EndpointAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether the address starts with a scheme such as `http://`.
    pub fn has_scheme(&self) -> bool {
        self.0.trim().split_once("://").is_some_and(|(scheme, _)| {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
    }

    /// Convert to a URI, adding `https://` or `http://` when no scheme is present.
    pub fn to_uri(&self, secure: bool) -> Result<Uri, EndpointError> {
        if self.is_empty() {
            return Err(EndpointError::Empty);
        }
        let address = self.0.trim();
        let uri = if self.has_scheme() {
            address.to_string()
        } else if secure {
            format!("https://{address}")
        } else {
            format!("http://{address}")
        };
        let uri: Uri = uri.parse().map_err(|source| EndpointError::InvalidUri {
            address: address.to_string(),
            source,
        })?;
        if uri.host().is_none() {
            return Err(EndpointError::MissingHost(address.to_string()));
        }
        Ok(uri)
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for EndpointAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&String> for EndpointAddress {
    fn from(address: &String) -> Self {
        Self(address.clone())
    }
}
