//! Core domain model types for visitorflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Step id and status enums
//! - The per-step record
//! - The aggregate run result

mod result;
mod status;
mod step;

pub use result::{step_status_summary, NotificationPipelineResult, StepStatusSummary};
pub use status::{StepId, StepStatus};
pub use step::NotificationStep;
