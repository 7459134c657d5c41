//! Progress sinks: observers of step transitions.

use parking_lot::RwLock;
use tracing::{debug, info, Level};

use crate::core::{NotificationStep, StepId, StepStatus};

/// Receives a copy of a step at every status transition.
///
/// Called synchronously from the pipeline, so implementations should return
/// quickly.
pub trait ProgressSink: Send + Sync {
    /// Handles one transition.
    fn on_step_update(&self, step: &NotificationStep);
}

impl<F> ProgressSink for F
where
    F: Fn(&NotificationStep) + Send + Sync,
{
    fn on_step_update(&self, step: &NotificationStep) {
        self(step);
    }
}

/// Discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn on_step_update(&self, _step: &NotificationStep) {}
}

/// Logs every update through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn on_step_update(&self, step: &NotificationStep) {
        if self.level == Level::DEBUG {
            debug!(
                step = %step.id,
                status = %step.status,
                attempt = step.attempts,
                of = step.max_attempts,
                error = ?step.error,
                "Step update"
            );
        } else {
            info!(
                step = %step.id,
                status = %step.status,
                attempt = step.attempts,
                of = step.max_attempts,
                error = ?step.error,
                "Step update"
            );
        }
    }
}

/// Keeps every update, for tests and UIs that poll.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    updates: RwLock<Vec<NotificationStep>>,
}

impl CollectingProgressSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates in arrival order.
    #[must_use]
    pub fn updates(&self) -> Vec<NotificationStep> {
        self.updates.read().clone()
    }

    /// Updates for one step.
    #[must_use]
    pub fn updates_for(&self, id: StepId) -> Vec<NotificationStep> {
        self.updates
            .read()
            .iter()
            .filter(|s| s.id == id)
            .cloned()
            .collect()
    }

    /// Status sequence seen for one step.
    #[must_use]
    pub fn statuses_for(&self, id: StepId) -> Vec<StepStatus> {
        self.updates_for(id).into_iter().map(|s| s.status).collect()
    }

    /// Number of updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.read().len()
    }

    /// True if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.read().is_empty()
    }

    /// Drops all updates.
    pub fn clear(&self) {
        self.updates.write().clear();
    }
}

impl ProgressSink for CollectingProgressSink {
    fn on_step_update(&self, step: &NotificationStep) {
        self.updates.write().push(step.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_noop_and_logging_sinks() {
        let step = NotificationStep::new(StepId::HostEmail, 3);
        NoOpProgressSink.on_step_update(&step);
        LoggingProgressSink::default().on_step_update(&step);
        LoggingProgressSink::debug().on_step_update(&step);
    }

    #[test]
    fn test_closure_sink() {
        let calls = AtomicUsize::new(0);
        let sink = |_: &NotificationStep| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        sink.on_step_update(&NotificationStep::new(StepId::FileUpload, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingProgressSink::new();
        assert!(sink.is_empty());

        let mut step = NotificationStep::new(StepId::ChatNotification, 2);
        step.begin_attempt();
        sink.on_step_update(&step);
        step.complete(serde_json::Value::Null);
        sink.on_step_update(&step);
        sink.on_step_update(&NotificationStep::new(StepId::FinalStatus, 2));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.statuses_for(StepId::ChatNotification),
            vec![StepStatus::Processing, StepStatus::Completed]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
