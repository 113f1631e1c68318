//! The live connection and the calls issued over it.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use http::uri::PathAndQuery;
use tokio::time::Instant;
use tonic::client::Grpc;
use tonic::codec::{Codec, Streaming};
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::{Code, Extensions, Request, Response, Status};

use crate::codec::RawCodec;
use crate::config::CallPolicy;
use crate::endpoint::EndpointAddress;
use crate::interceptor::{StreamChain, UnaryChain};

mod outbound;

use outbound::{Outbound, Replay};

/// Pause before the first readiness retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(20);
/// Upper bound on the pause between readiness retries.
const MAX_BACKOFF: Duration = Duration::from_millis(500);

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// A connection established by a [`ConnectionManager`](crate::ConnectionManager).
///
/// Carries the channel together with the interceptor chains and call policy
/// attached at establishment. Every call made through [`unary`](Self::unary)
/// or [`streaming`](Self::streaming) runs through the matching chain and
/// policy. Calls are safe to issue concurrently.
///
/// The manager owns the handle; callers borrow it through
/// [`ConnectionManager::handle`](crate::ConnectionManager::handle), so
/// releasing or re-establishing closes the connection.
///
/// # Example
///
/// ```ignore
/// let handle = manager.handle().expect("established");
/// let reply = handle
///     .unary_bytes("/echo.v1.Echo/Say", handle.request_with_budget(payload))
///     .await?;
/// ```
#[derive(Debug)]
pub struct ConnectionHandle {
    channel: Channel,
    endpoint: EndpointAddress,
    unary_chain: UnaryChain,
    stream_chain: StreamChain,
    policy: CallPolicy,
    call_budget: Duration,
}

impl ConnectionHandle {
    pub(crate) fn new(
        channel: Channel,
        endpoint: EndpointAddress,
        unary_chain: UnaryChain,
        stream_chain: StreamChain,
        policy: CallPolicy,
        call_budget: Duration,
    ) -> Self {
        Self {
            channel,
            endpoint,
            unary_chain,
            stream_chain,
            policy,
            call_budget,
        }
    }

    pub fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    pub fn unary_chain(&self) -> &UnaryChain {
        &self.unary_chain
    }

    pub fn stream_chain(&self) -> &StreamChain {
        &self.stream_chain
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// The budget the connection was established with.
    pub fn call_budget(&self) -> Duration {
        self.call_budget
    }

    /// Wrap `message` in a request whose timeout is the call budget.
    ///
    /// Per-call deadlines are the caller's choice; nothing applies the budget
    /// to calls implicitly.
    pub fn request_with_budget<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.call_budget);
        request
    }

    /// Issue a unary call to `method` (e.g. `/package.Service/Method`).
    ///
    /// With `wait_for_ready` set, a call the transport could not deliver
    /// because the connection is unavailable is retried until the request
    /// timeout or the call budget, whichever is shorter, runs out. Request
    /// extensions only travel with the first attempt.
    pub async fn unary<C>(
        &self,
        method: &str,
        request: Request<C::Encode>,
        codec: C,
    ) -> Result<Response<C::Decode>, Status>
    where
        C: Codec + Clone,
        C::Encode: Sync,
        C::Decode: Sync,
    {
        let path = parse_path(method)?;
        let (metadata, extensions, message) = request.into_parts();
        let outbound = Outbound::new(futures::stream::once(futures::future::ready(message)));
        self.unary_chain
            .intercept(method, metadata, |metadata| async move {
                self.call_until_ready(&outbound, metadata, extensions, |request| {
                    let mut grpc = self.grpc();
                    let path = path.clone();
                    let codec = codec.clone();
                    async move {
                        grpc.ready().await.map_err(not_ready)?;
                        grpc.client_streaming(request, path, codec).await
                    }
                })
                .await
            })
            .await
    }

    /// Open a bidirectional stream to `method`.
    ///
    /// Response hooks run once the stream is open; the returned stream yields
    /// the replies. Readiness waiting works as for [`unary`](Self::unary) and
    /// stops once the transport has read from `request`.
    pub async fn streaming<C, S>(
        &self,
        method: &str,
        request: Request<S>,
        codec: C,
    ) -> Result<Response<Streaming<C::Decode>>, Status>
    where
        C: Codec + Clone,
        C::Encode: Sync,
        C::Decode: Sync,
        S: Stream<Item = C::Encode> + Send + 'static,
    {
        let path = parse_path(method)?;
        let (metadata, extensions, messages) = request.into_parts();
        let outbound = Outbound::new(messages);
        self.stream_chain
            .intercept(method, metadata, |metadata| async move {
                self.call_until_ready(&outbound, metadata, extensions, |request| {
                    let mut grpc = self.grpc();
                    let path = path.clone();
                    let codec = codec.clone();
                    async move {
                        grpc.ready().await.map_err(not_ready)?;
                        grpc.streaming(request, path, codec).await
                    }
                })
                .await
            })
            .await
    }

    /// [`unary`](Self::unary) with pre-encoded payloads.
    pub async fn unary_bytes(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, Status> {
        self.unary(method, request, RawCodec).await
    }

    /// [`streaming`](Self::streaming) with pre-encoded payloads.
    pub async fn streaming_bytes<S>(
        &self,
        method: &str,
        request: Request<S>,
    ) -> Result<Response<Streaming<Bytes>>, Status>
    where
        S: Stream<Item = Bytes> + Send + 'static,
    {
        self.streaming(method, request, RawCodec).await
    }

    fn grpc(&self) -> Grpc<Channel> {
        let grpc = Grpc::new(self.channel.clone())
            .max_decoding_message_size(self.policy.max_receive_message_size);
        match self.policy.max_send_message_size {
            Some(limit) => grpc.max_encoding_message_size(limit),
            None => grpc,
        }
    }

    /// Run `attempt` until it succeeds, fails for a reason other than an
    /// unavailable transport, or the wait deadline passes.
    ///
    /// Only attempts that never read `outbound` are repeated, so no message
    /// is sent twice. Without `wait_for_ready` the first result is final.
    async fn call_until_ready<M, T, F, Fut>(
        &self,
        outbound: &Outbound<M>,
        metadata: MetadataMap,
        extensions: Extensions,
        mut attempt: F,
    ) -> Result<T, Status>
    where
        F: FnMut(Request<Replay<M>>) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let deadline = Instant::now().checked_add(self.wait_budget(&metadata));
        let mut extensions = Some(extensions);
        let mut backoff = INITIAL_BACKOFF;
        let mut attempts: u32 = 0;

        loop {
            let request = match extensions.take() {
                Some(extensions) => Request::from_parts(metadata.clone(), extensions, outbound.replay()),
                None => {
                    let mut request = Request::new(outbound.replay());
                    *request.metadata_mut() = metadata.clone();
                    request
                }
            };
            attempts += 1;

            let status = match attempt(request).await {
                Ok(response) => return Ok(response),
                Err(status) => status,
            };
            let retryable = self.policy.wait_for_ready
                && status.code() == Code::Unavailable
                && outbound.is_untouched();
            if !retryable {
                return Err(status);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        tracing::debug!(
                            endpoint = %self.endpoint,
                            attempts,
                            error = status.message(),
                            "connection did not become ready before the deadline"
                        );
                        return Err(status);
                    }
                    backoff.min(remaining)
                }
                None => backoff,
            };
            tracing::debug!(
                endpoint = %self.endpoint,
                attempts,
                backoff = ?pause,
                error = status.message(),
                "connection not ready, waiting"
            );
            tokio::time::sleep(pause).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// How long a call may wait for the connection: the request timeout when
    /// it is shorter than the call budget.
    fn wait_budget(&self, metadata: &MetadataMap) -> Duration {
        match grpc_timeout(metadata) {
            Some(timeout) => timeout.min(self.call_budget),
            None => self.call_budget,
        }
    }
}

fn not_ready(err: tonic::transport::Error) -> Status {
    Status::unavailable(format!("service was not ready: {err}"))
}

/// Parse the `grpc-timeout` header (`<digits><unit>`).
fn grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let value = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    let split = value.len().checked_sub(1)?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(amount.saturating_mul(3600)),
        "M" => Duration::from_secs(amount.saturating_mul(60)),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}

fn parse_path(method: &str) -> Result<PathAndQuery, Status> {
    if !method.starts_with('/') {
        return Err(Status::invalid_argument(format!(
            "method path must start with '/': {method}"
        )));
    }
    method
        .parse()
        .map_err(|e| Status::invalid_argument(format!("invalid method path {method:?}: {e}")))
}
