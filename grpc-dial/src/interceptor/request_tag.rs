//! Request tagging.

use tonic::Status;
use tonic::metadata::MetadataValue;
use uuid::Uuid;

use super::{CallContext, Interceptor};

/// Metadata key carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Metadata key carrying the trace id, for peers that don't read `traceparent`.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Tags every request with an id, and with the trace id when one exists.
///
/// A request id supplied by the caller is kept.
#[derive(Debug, Clone, Default)]
pub struct RequestTagging;

impl RequestTagging {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for RequestTagging {
    fn name(&self) -> &str {
        "request-tagging"
    }

    fn before_call(&self, call: &mut CallContext) -> Result<(), Status> {
        if !call.metadata().contains_key(REQUEST_ID_HEADER) {
            let id: MetadataValue<_> = Uuid::new_v4()
                .to_string()
                .parse()
                .map_err(|_| Status::internal("unencodable request id"))?;
            call.metadata_mut().insert(REQUEST_ID_HEADER, id);
        }

        if let Some(trace_id) = call.trace().map(|t| t.trace_id().to_string()) {
            let value: MetadataValue<_> = trace_id
                .parse()
                .map_err(|_| Status::internal("unencodable trace id"))?;
            call.metadata_mut().insert(TRACE_ID_HEADER, value);
        }
        Ok(())
    }
}
