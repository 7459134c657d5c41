//! Aggregate outcome of a notification run.

use serde::{Deserialize, Serialize};

use super::status::{StepId, StepStatus};
use super::step::NotificationStep;

/// Counts of steps by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepStatusSummary {
    /// Completed steps.
    pub completed: usize,
    /// Failed steps.
    pub failed: usize,
    /// Steps processing or retrying.
    pub processing: usize,
    /// Steps not yet started.
    pub pending: usize,
    /// All steps.
    pub total: usize,
}

/// Counts steps by status.
#[must_use]
pub fn step_status_summary(steps: &[NotificationStep]) -> StepStatusSummary {
    let count = |pred: fn(&StepStatus) -> bool| steps.iter().filter(|s| pred(&s.status)).count();

    StepStatusSummary {
        completed: count(|s| *s == StepStatus::Completed),
        failed: count(|s| *s == StepStatus::Failed),
        processing: count(StepStatus::is_active),
        pending: count(|s| *s == StepStatus::Pending),
        total: steps.len(),
    }
}

/// Result of a notification run (or of a retry pass over one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPipelineResult {
    /// See [`NotificationPipelineResult::recompute`].
    pub success: bool,
    /// Number of steps.
    pub total_steps: usize,
    /// Steps that completed.
    pub completed_steps: usize,
    /// Steps that failed.
    pub failed_steps: usize,
    /// Steps in run order.
    pub steps: Vec<NotificationStep>,
    /// Record created or reused by the file-upload step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday_record_id: Option<u64>,
    /// Link to that record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday_record_url: Option<String>,
}

impl NotificationPipelineResult {
    /// Creates a result around freshly constructed steps.
    #[must_use]
    pub fn new(steps: Vec<NotificationStep>) -> Self {
        Self {
            success: false,
            total_steps: steps.len(),
            completed_steps: 0,
            failed_steps: 0,
            steps,
            monday_record_id: None,
            monday_record_url: None,
        }
    }

    /// Recounts steps and derives `success`.
    ///
    /// A run succeeds when nothing failed, or when partial failure is
    /// tolerated and at least one step completed.
    pub fn recompute(&mut self, continue_on_failure: bool) {
        let summary = self.status_summary();
        self.total_steps = summary.total;
        self.completed_steps = summary.completed;
        self.failed_steps = summary.failed;
        self.success =
            self.failed_steps == 0 || (continue_on_failure && self.completed_steps > 0);
    }

    /// Counts steps by status.
    #[must_use]
    pub fn status_summary(&self) -> StepStatusSummary {
        step_status_summary(&self.steps)
    }

    /// Ids of failed steps, in run order.
    #[must_use]
    pub fn failed_step_ids(&self) -> Vec<StepId> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.id)
            .collect()
    }

    /// Looks up a step by id.
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&NotificationStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Mutable lookup by id.
    pub fn step_mut(&mut self, id: StepId) -> Option<&mut NotificationStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }
}
