//! The per-step record mutated by the pipeline.

use serde::{Deserialize, Serialize};

use super::status::{StepId, StepStatus};
use crate::utils::{elapsed_ms, now_utc, Timestamp};

/// One step of a notification run.
///
/// The pipeline owns the instance and mutates it in place; observers only
/// ever receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStep {
    /// Stable step id.
    pub id: StepId,
    /// Human-readable label.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// Attempts made so far.
    pub attempts: u32,
    /// Attempt ceiling (`max_retries + 1`).
    pub max_attempts: u32,
    /// Payload of the successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Last failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start of the most recent attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// End of the most recent attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Duration of the most recent attempt in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl NotificationStep {
    /// Creates a pending step.
    #[must_use]
    pub fn new(id: StepId, max_attempts: u32) -> Self {
        Self {
            id,
            name: id.label().to_string(),
            status: StepStatus::Pending,
            attempts: 0,
            max_attempts,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
            duration_ms: None,
        }
    }

    /// True while attempts remain.
    #[must_use]
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Starts the next attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.status = if self.attempts > 1 {
            StepStatus::Retrying
        } else {
            StepStatus::Processing
        };
        self.start_time = Some(now_utc());
    }

    /// Records a successful attempt.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.result = Some(result);
        self.status = StepStatus::Completed;
        self.error = None;
        self.stamp_end();
    }

    /// Records a failed attempt, leaving the status untouched.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.stamp_end();
    }

    /// Marks the step as failed for good.
    pub fn fail(&mut self) {
        self.status = StepStatus::Failed;
    }

    /// Returns the step to `pending` for another round of attempts.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.attempts = 0;
        self.error = None;
    }

    fn stamp_end(&mut self) {
        let end = now_utc();
        self.duration_ms = self.start_time.map(|start| elapsed_ms(&start, &end));
        self.end_time = Some(end);
    }
}
