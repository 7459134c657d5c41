//! The notification pipeline.
//!
//! This module provides:
//! - Pipeline configuration
//! - The per-step attempt loop
//! - Progress sinks
//! - The six-step notification run and its selective retry

mod config;
mod executor;
mod notification;
mod progress;

#[cfg(test)]
mod integration_tests;

pub use config::PipelineConfig;
pub use executor::{execute_step, TIMEOUT_MESSAGE};
pub use notification::{NotificationPipeline, PipelineServices};
pub use progress::{
    CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink,
};
