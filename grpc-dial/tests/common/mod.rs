//! A raw-bytes echo server for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use grpc_dial::interceptor::{REQUEST_ID_HEADER, TRACE_ID_HEADER, TRACEPARENT_HEADER};
use grpc_dial::transport::{Connector, TransportSettings, build_endpoint};
use grpc_dial::{BoxError, RawCodec};
use http::Uri;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::body::Body;
use tonic::codec::Streaming;
use tonic::metadata::MetadataMap;
use tonic::server::{Grpc, NamedService, StreamingService, UnaryService};
use tonic::transport::Channel;
use tonic::transport::server::{Connected, TcpConnectInfo};
use tonic::{Request, Response, Status};
use tower::Service;

pub const UNARY: &str = "/test.Echo/Unary";
pub const BIDI: &str = "/test.Echo/Bidi";
/// Replies with as many bytes as the decimal request body asks for.
pub const SIZED: &str = "/test.Echo/Sized";
/// Always fails with `Unavailable` after reading the request.
pub const UNAVAILABLE: &str = "/test.Echo/Unavailable";

/// A running echo server.
pub struct EchoServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl EchoServer {
    pub async fn spawn() -> Self {
        Self::spawn_on("127.0.0.1:0".parse().unwrap()).await
    }

    /// Serve on a specific address, e.g. one a client already targets.
    pub async fn spawn_on(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = EchoService::default();
        let hits = service.hits.clone();
        let open = Arc::new(AtomicUsize::new(0));

        let counter = open.clone();
        let incoming = TcpListenerStream::new(listener)
            .map(move |conn| conn.map(|stream| Tracked::new(stream, counter.clone())));
        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming(incoming)
                .await
                .unwrap();
        });

        Self { addr, hits, open }
    }

    /// Calls that reached a handler.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Client connections the server currently holds open.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Wait until the server holds `count` open connections.
    pub async fn wait_for_open_connections(&self, count: usize) {
        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            while self.open_connections() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            settled.is_ok(),
            "expected {count} open connections, server holds {}",
            self.open_connections()
        );
    }
}

/// Connects without waiting for the transport, like a channel created
/// before its server is up.
#[derive(Debug, Clone, Default)]
pub struct LazyConnector;

impl Connector for LazyConnector {
    fn connect<'a>(
        &'a self,
        target: &'a Uri,
        settings: &'a TransportSettings,
        budget: Duration,
    ) -> BoxFuture<'a, Result<Channel, BoxError>> {
        async move {
            let endpoint = build_endpoint(target.clone(), settings, budget)?;
            Ok::<_, BoxError>(endpoint.connect_lazy())
        }
        .boxed()
    }
}

/// A server-side TCP stream that counts itself while open.
struct Tracked {
    stream: TcpStream,
    open: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(stream: TcpStream, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { stream, open }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connected for Tracked {
    type ConnectInfo = TcpConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.stream.connect_info()
    }
}

impl AsyncRead for Tracked {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tracked {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// An address nobody listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Copy the tagging headers a client sent into the reply metadata.
fn reflect_tags(from: &MetadataMap, to: &mut MetadataMap) {
    for key in [REQUEST_ID_HEADER, TRACE_ID_HEADER, TRACEPARENT_HEADER] {
        if let Some(value) = from.get(key) {
            to.insert(key, value.clone());
        }
    }
}

#[derive(Debug, Clone, Default)]
struct EchoService {
    hits: Arc<AtomicUsize>,
}

impl NamedService for EchoService {
    const NAME: &'static str = "test.Echo";
}

impl Service<http::Request<Body>> for EchoService {
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let hits = self.hits.clone();
        let path = req.uri().path().to_string();
        match path.as_str() {
            UNARY => async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Grpc::new(RawCodec).unary(Echo, req).await)
            }
            .boxed(),
            SIZED => async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Grpc::new(RawCodec).unary(SizedReply, req).await)
            }
            .boxed(),
            UNAVAILABLE => async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Grpc::new(RawCodec).unary(Refuse, req).await)
            }
            .boxed(),
            BIDI => async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Grpc::new(RawCodec).streaming(EchoStream, req).await)
            }
            .boxed(),
            _ => async move { Ok::<_, Infallible>(Status::unimplemented("unknown method").into_http()) }.boxed(),
        }
    }
}

struct Echo;

impl UnaryService<Bytes> for Echo {
    type Response = Bytes;
    type Future = BoxFuture<'static, Result<Response<Bytes>, Status>>;

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        async move {
            let mut response = Response::new(request.get_ref().clone());
            reflect_tags(request.metadata(), response.metadata_mut());
            Ok(response)
        }
        .boxed()
    }
}

struct Refuse;

impl UnaryService<Bytes> for Refuse {
    type Response = Bytes;
    type Future = BoxFuture<'static, Result<Response<Bytes>, Status>>;

    fn call(&mut self, _request: Request<Bytes>) -> Self::Future {
        async move { Err(Status::unavailable("draining")) }.boxed()
    }
}

struct SizedReply;

impl UnaryService<Bytes> for SizedReply {
    type Response = Bytes;
    type Future = BoxFuture<'static, Result<Response<Bytes>, Status>>;

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        async move {
            let len: usize = std::str::from_utf8(request.get_ref())
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Status::invalid_argument("body must be a decimal length"))?;
            Ok::<_, Status>(Response::new(Bytes::from(vec![b'x'; len])))
        }
        .boxed()
    }
}

struct EchoStream;

impl StreamingService<Bytes> for EchoStream {
    type Response = Bytes;
    type ResponseStream = BoxStream<'static, Result<Bytes, Status>>;
    type Future = BoxFuture<'static, Result<Response<Self::ResponseStream>, Status>>;

    fn call(&mut self, request: Request<Streaming<Bytes>>) -> Self::Future {
        async move {
            let mut metadata = MetadataMap::new();
            reflect_tags(request.metadata(), &mut metadata);
            let replies = request.into_inner().boxed();
            let mut response = Response::new(replies);
            *response.metadata_mut() = metadata;
            Ok(response)
        }
        .boxed()
    }
}
