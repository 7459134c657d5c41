//! Attempt loop shared by every pipeline step.

use std::future::Future;
use tracing::{debug, warn};

use super::config::PipelineConfig;
use super::progress::ProgressSink;
use crate::core::NotificationStep;
use crate::errors::{ServiceError, VisitorflowError};

/// Message recorded when an attempt exceeds the configured timeout.
pub const TIMEOUT_MESSAGE: &str = "Operation timeout";

/// Runs `operation` for `step` until it succeeds or attempts run out.
///
/// Each attempt is bounded by the configured timeout, and `sink` sees the
/// step when an attempt starts, when it completes and when the step fails
/// for good. Intermediate failures only update `error` and timing.
///
/// Returns `Err` only when the step failed and the configuration does not
/// continue on failure.
pub async fn execute_step<F, Fut>(
    step: &mut NotificationStep,
    config: &PipelineConfig,
    sink: &dyn ProgressSink,
    mut operation: F,
) -> Result<(), VisitorflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, ServiceError>>,
{
    while step.has_attempts_left() {
        step.begin_attempt();
        sink.on_step_update(step);

        let outcome = match tokio::time::timeout(config.timeout(), operation()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ServiceError::timeout(TIMEOUT_MESSAGE)),
        };

        match outcome {
            Ok(value) => {
                step.complete(value);
                debug!(step = %step.id, attempt = step.attempts, duration_ms = ?step.duration_ms, "Step completed");
                sink.on_step_update(step);
                return Ok(());
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    step = %step.id,
                    attempt = step.attempts,
                    of = step.max_attempts,
                    error = %message,
                    "Step attempt failed"
                );
                step.record_failure(message.clone());

                if step.has_attempts_left() {
                    tokio::time::sleep(config.retry_delay()).await;
                } else {
                    step.fail();
                    sink.on_step_update(step);
                    if !config.continue_on_failure {
                        return Err(VisitorflowError::step_failed(step.id.as_str(), message));
                    }
                }
            }
        }
    }

    Ok(())
}
