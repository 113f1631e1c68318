//! Call logging.

use tonic::Status;

use super::{CallContext, CallOutcome, Interceptor};

/// Logs call start and completion through `tracing`.
///
/// Events are emitted inside the call span, so a preceding
/// [`TracePropagation`](super::TracePropagation) correlates them with the
/// trace.
#[derive(Debug, Clone, Default)]
pub struct Logging;

impl Logging {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for Logging {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_call(&self, call: &mut CallContext) -> Result<(), Status> {
        let trace_id = call.trace().map(|t| t.trace_id().to_string());
        call.span().in_scope(|| {
            tracing::debug!(
                rpc.method = %call.method(),
                rpc.type = call.kind().as_str(),
                trace_id = trace_id.as_deref(),
                "starting call"
            );
        });
        Ok(())
    }

    fn after_call(&self, call: &CallContext, outcome: CallOutcome<'_>) {
        let trace_id = call.trace().map(|t| t.trace_id());
        let elapsed_ms = u64::try_from(call.elapsed().as_millis()).unwrap_or(u64::MAX);
        call.span().in_scope(|| match outcome {
            CallOutcome::Completed => tracing::debug!(
                rpc.method = %call.method(),
                rpc.type = call.kind().as_str(),
                code = ?outcome.code(),
                elapsed_ms,
                trace_id,
                "call completed"
            ),
            CallOutcome::Failed(status) => tracing::warn!(
                rpc.method = %call.method(),
                rpc.type = call.kind().as_str(),
                code = ?status.code(),
                error = status.message(),
                elapsed_ms,
                trace_id,
                "call failed"
            ),
        });
    }
}
