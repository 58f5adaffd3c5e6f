//! Host boundary: one serverless invocation in, one digest out

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::invocation::Invocation;
use crate::runner::TaskRunner;
use crate::storage::ObjectStorage;
use crate::types::HostContext;

/// Handle one invocation event
///
/// Parses the event, runs every object within the host's remaining time and
/// applies the configured [`FailurePolicy`](crate::config::FailurePolicy).
/// Returns the digest when the batch passes, or
/// [`Error::AggregateFailure`] carrying the same digest when it does not.
/// Configuration and event errors are returned before any storage call.
pub async fn handle_event(
    storage: Arc<dyn ObjectStorage>,
    event: Value,
    context: HostContext,
    config: &RunnerConfig,
) -> Result<String> {
    config.validate()?;

    let invocation = Invocation::from_event(event).inspect_err(|e| {
        tracing::error!(
            request_id = context.request_id.as_deref(),
            error = %e,
            "Rejected invocation event"
        );
    })?;
    let descriptors = invocation.descriptors();

    tracing::info!(
        request_id = context.request_id.as_deref(),
        objects = descriptors.len(),
        remaining_ms = context.remaining_time_ms,
        target = invocation.destination.as_ref().map(|d| d.bucket.as_str()),
        "Handling invocation"
    );

    let runner = TaskRunner::new(storage, config.clone());
    let summary = runner
        .run_all(descriptors, Duration::from_millis(context.remaining_time_ms))
        .await;

    let digest = summary.digest();
    if config.failure_policy.is_failure(summary.success, summary.total) {
        tracing::error!(
            request_id = context.request_id.as_deref(),
            failed = summary.failed(),
            total = summary.total,
            "Invocation failed"
        );
        return Err(Error::AggregateFailure {
            digest,
            failed: summary.failed(),
            total: summary.total,
        });
    }

    tracing::info!(
        request_id = context.request_id.as_deref(),
        success = summary.success,
        total = summary.total,
        "Invocation succeeded"
    );
    Ok(digest)
}
