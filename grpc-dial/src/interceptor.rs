//! Interceptors for gRPC client calls.
//!
//! Interceptors add cross-cutting logic around every call made over a
//! connection: trace propagation, logging, request tagging, or anything a
//! caller supplies.
//!
//! A chain is typed by the call shape it wraps, so a streaming chain can never
//! be attached where a unary chain is expected:
//!
//! - [`UnaryChain`]: single request, single response
//! - [`StreamChain`]: bidirectional streaming
//!
//! Request hooks run first-to-last; response hooks run last-to-first, like
//! middleware unwinding.
//!
//! # Example
//!
//! ```
//! use grpc_dial::interceptor::{Logging, RequestTagging, TracePropagation, UnaryChain};
//!
//! let chain = UnaryChain::new()
//!     .with(TracePropagation::new())
//!     .with(Logging::new())
//!     .with(RequestTagging::new());
//!
//! assert_eq!(chain.names(), ["trace-propagation", "logging", "request-tagging"]);
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tonic::metadata::MetadataMap;
use tonic::{Code, Status};
use tracing::{Instrument, Span};

mod logging;
mod request_tag;
mod trace;

pub use logging::Logging;
pub use request_tag::{REQUEST_ID_HEADER, RequestTagging, TRACE_ID_HEADER};
pub use trace::{TRACEPARENT_HEADER, TraceContext, TracePropagation};

// ============================================================================
// Call shapes
// ============================================================================

/// The shape of a call, as seen by interceptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Streaming,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Unary => "unary",
            CallKind::Streaming => "streaming",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-level marker for the call shape a chain wraps.
pub trait CallShape: sealed::Sealed + Send + Sync + 'static {
    const KIND: CallKind;
}

/// Marker for single-request/single-response calls.
#[derive(Debug, Clone, Copy)]
pub struct Unary;

/// Marker for streaming calls.
#[derive(Debug, Clone, Copy)]
pub struct Streaming;

impl sealed::Sealed for Unary {}
impl sealed::Sealed for Streaming {}

impl CallShape for Unary {
    const KIND: CallKind = CallKind::Unary;
}

impl CallShape for Streaming {
    const KIND: CallKind = CallKind::Streaming;
}

// ============================================================================
// Call context
// ============================================================================

/// Per-call state that interceptors inspect and modify.
#[derive(Debug)]
pub struct CallContext {
    kind: CallKind,
    method: String,
    metadata: MetadataMap,
    trace: Option<TraceContext>,
    span: Span,
    started: Instant,
}

impl CallContext {
    /// Create a context for a call to `method` carrying `metadata`.
    pub fn new(kind: CallKind, method: impl Into<String>, metadata: MetadataMap) -> Self {
        Self {
            kind,
            method: method.into(),
            metadata,
            trace: None,
            span: Span::none(),
            started: Instant::now(),
        }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Full method path, e.g. `/package.Service/Method`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request metadata as it will be sent.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }

    /// Trace context, once an interceptor has established one.
    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    pub fn set_trace(&mut self, trace: TraceContext) {
        self.trace = Some(trace);
    }

    /// The span the call runs in. Disabled until an interceptor sets one.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// What a call produced, as reported to response hooks.
///
/// For streaming calls `Completed` means the stream was opened.
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    Completed,
    Failed(&'a Status),
}

impl CallOutcome<'_> {
    pub fn code(&self) -> Code {
        match self {
            CallOutcome::Completed => Code::Ok,
            CallOutcome::Failed(status) => status.code(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CallOutcome::Completed)
    }

    pub fn status(&self) -> Option<&Status> {
        match self {
            CallOutcome::Completed => None,
            CallOutcome::Failed(status) => Some(status),
        }
    }
}

// ============================================================================
// Intercept trait
// ============================================================================

/// Trait for intercepting gRPC calls.
///
/// Implementations can modify request metadata, log calls, or return a status
/// to abort the call before it reaches the transport.
pub trait Interceptor: Send + Sync {
    /// Stable name, used to inspect chain order.
    fn name(&self) -> &str;

    /// Called before the request is sent.
    fn before_call(&self, call: &mut CallContext) -> Result<(), Status> {
        let _ = call;
        Ok(())
    }

    /// Called after the call completed, or after the stream was opened.
    ///
    /// Only interceptors whose `before_call` succeeded see this.
    fn after_call(&self, call: &CallContext, outcome: CallOutcome<'_>) {
        let _ = (call, outcome);
    }
}

// ============================================================================
// Chain
// ============================================================================

/// An ordered, immutable-once-attached sequence of interceptors for one call shape.
pub struct InterceptorChain<S> {
    interceptors: Vec<Arc<dyn Interceptor>>,
    _shape: PhantomData<fn() -> S>,
}

/// Interceptor chain for unary calls.
pub type UnaryChain = InterceptorChain<Unary>;

/// Interceptor chain for streaming calls.
pub type StreamChain = InterceptorChain<Streaming>;

impl<S> Clone for InterceptorChain<S> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
            _shape: PhantomData,
        }
    }
}

impl<S: CallShape> fmt::Debug for InterceptorChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("kind", &S::KIND)
            .field("interceptors", &self.names())
            .finish()
    }
}

impl<S: CallShape> Default for InterceptorChain<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CallShape> InterceptorChain<S> {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
            _shape: PhantomData,
        }
    }

    /// Append an interceptor.
    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append a shared interceptor.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn kind(&self) -> CallKind {
        S::KIND
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Interceptor names in chain order.
    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run `invoke` wrapped by every interceptor in the chain.
    ///
    /// `invoke` receives the metadata produced by the request hooks and runs
    /// inside the call span.
    pub(crate) async fn intercept<T, F, Fut>(
        &self,
        method: &str,
        metadata: MetadataMap,
        invoke: F,
    ) -> Result<T, Status>
    where
        F: FnOnce(MetadataMap) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let mut call = CallContext::new(S::KIND, method, metadata);

        let mut entered = 0;
        let mut rejected = None;
        for interceptor in &self.interceptors {
            if let Err(status) = interceptor.before_call(&mut call) {
                rejected = Some(status);
                break;
            }
            entered += 1;
        }

        let result = match rejected {
            Some(status) => Err(status),
            None => {
                let span = call.span().clone();
                invoke(call.metadata().clone()).instrument(span).await
            }
        };

        let outcome = match &result {
            Ok(_) => CallOutcome::Completed,
            Err(status) => CallOutcome::Failed(status),
        };
        // Reverse order for responses
        for interceptor in self.interceptors[..entered].iter().rev() {
            interceptor.after_call(&call, outcome);
        }
        result
    }
}

fn default_chain<S: CallShape>() -> InterceptorChain<S> {
    InterceptorChain::new()
        .with(TracePropagation::new())
        .with(Logging::new())
        .with(RequestTagging::new())
}

/// The default unary chain: trace propagation, logging, request tagging.
///
/// Trace context is established first so log lines and tags can be
/// correlated to it.
pub fn default_unary_chain() -> UnaryChain {
    default_chain()
}

/// The default streaming chain, in the same order as [`default_unary_chain`].
pub fn default_stream_chain() -> StreamChain {
    default_chain()
}
