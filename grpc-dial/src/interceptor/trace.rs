//! W3C trace-context propagation.

use tonic::Status;
use tonic::metadata::MetadataValue;

use super::{CallContext, Interceptor};

/// Metadata key carrying the W3C trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// A W3C trace context: trace id, this call's span id and its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    sampled: bool,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: random_hex_id::<16>(),
            span_id: random_hex_id::<8>(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Continue this trace in a new span.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: random_hex_id::<8>(),
            parent_span_id: Some(self.span_id.clone()),
            sampled: self.sampled,
        }
    }

    /// Parse a `traceparent` value (`00-<trace-id>-<span-id>-<flags>`).
    ///
    /// Returns `None` for malformed values and all-zero ids.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if !is_hex(version, 2) || version == "ff" {
            return None;
        }
        // Version 00 has exactly four fields.
        if version == VERSION && parts.next().is_some() {
            return None;
        }
        if !is_hex(trace_id, 32) || is_zero(trace_id) {
            return None;
        }
        if !is_hex(span_id, 16) || is_zero(span_id) {
            return None;
        }
        if !is_hex(flags, 2) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            parent_span_id: None,
            sampled: flags & FLAG_SAMPLED != 0,
        })
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Render as a `traceparent` value.
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { FLAG_SAMPLED } else { 0 };
        format!("{VERSION}-{}-{}-{flags:02x}", self.trace_id, self.span_id)
    }
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

/// Random non-zero id of `N` bytes, lowercase hex.
fn random_hex_id<const N: usize>() -> String {
    loop {
        let bytes: [u8; N] = rand::random();
        if bytes.iter().any(|b| *b != 0) {
            return bytes.iter().map(|b| format!("{b:02x}")).collect();
        }
    }
}

/// Establishes trace context for a call.
///
/// Continues the trace of an inbound `traceparent` entry, or starts a new one
/// when it is missing or malformed. Opens the `rpc.call` span the call runs in,
/// so it must come before interceptors that log or tag.
#[derive(Debug, Clone, Default)]
pub struct TracePropagation;

impl TracePropagation {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for TracePropagation {
    fn name(&self) -> &str {
        "trace-propagation"
    }

    fn before_call(&self, call: &mut CallContext) -> Result<(), Status> {
        let trace = call
            .metadata()
            .get(TRACEPARENT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(TraceContext::parse)
            .map(|parent| parent.child())
            .unwrap_or_else(TraceContext::new_root);

        let value: MetadataValue<_> = trace
            .to_traceparent()
            .parse()
            .map_err(|_| Status::internal("unencodable traceparent"))?;
        call.metadata_mut().insert(TRACEPARENT_HEADER, value);

        let span = tracing::info_span!(
            "rpc.call",
            rpc.method = %call.method(),
            rpc.type = call.kind().as_str(),
            otel.kind = "client",
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
        );
        call.set_span(span);
        call.set_trace(trace);
        Ok(())
    }
}
