//! Connection attempts.

use std::fmt::Debug;
use std::time::Duration;

use futures::future::BoxFuture;
use http::Uri;
use tonic::transport::{Channel, Endpoint};

use super::settings::{TransportSecurity, TransportSettings};
use crate::error::BoxError;

/// Performs one connection attempt.
///
/// The manager bounds the returned future by the call budget and drops it
/// when the budget elapses, so implementations need no timer of their own.
pub trait Connector: Debug + Send + Sync {
    fn connect<'a>(
        &'a self,
        target: &'a Uri,
        settings: &'a TransportSettings,
        budget: Duration,
    ) -> BoxFuture<'a, Result<Channel, BoxError>>;
}

/// Connects with [`tonic::transport::Endpoint`].
#[derive(Debug, Clone, Default)]
pub struct TonicConnector;

impl TonicConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TonicConnector {
    fn connect<'a>(
        &'a self,
        target: &'a Uri,
        settings: &'a TransportSettings,
        budget: Duration,
    ) -> BoxFuture<'a, Result<Channel, BoxError>> {
        Box::pin(async move {
            let endpoint = build_endpoint(target.clone(), settings, budget)?;
            let channel = endpoint.connect().await?;
            Ok::<_, BoxError>(channel)
        })
    }
}

/// Build a tonic endpoint for `target` from the transport settings.
pub fn build_endpoint(
    target: Uri,
    settings: &TransportSettings,
    budget: Duration,
) -> Result<Endpoint, BoxError> {
    let mut endpoint = Endpoint::from(target).connect_timeout(budget);
    if let Some(interval) = settings.tcp_keepalive {
        endpoint = endpoint.tcp_keepalive(Some(interval));
    }
    if let Some(interval) = settings.http2_keep_alive_interval {
        endpoint = endpoint.http2_keep_alive_interval(interval);
    }
    match &settings.security {
        TransportSecurity::Insecure => {}
        #[cfg(feature = "tls")]
        TransportSecurity::Tls(config) => {
            endpoint = endpoint.tls_config(config.clone())?;
        }
    }
    Ok(endpoint)
}
