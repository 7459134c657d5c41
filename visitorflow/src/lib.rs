//! # Visitorflow
//!
//! The notification pipeline a visitor check-in kiosk runs once a visitor
//! has signed in.
//!
//! A run takes a completed [`VisitorRegistration`](registration::VisitorRegistration)
//! through six fixed steps:
//!
//! - **File upload**: photo and signature onto a new visitor record
//! - **Record status**: mark the record as registered
//! - **Host email**: tell the host their visitor has arrived
//! - **Welcome email**: send the visitor the studio welcome package
//! - **Chat notification**: announce the visitor to the team
//! - **Final status**: write the run summary back to the record
//!
//! Each step is retried by the pipeline, and each external call inside a
//! step is retried again behind a per-service circuit breaker.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use visitorflow::prelude::*;
//!
//! let config = KioskConfig::from_env()?;
//! init_tracing(config.log_format);
//!
//! let pipeline = NotificationPipeline::from_config(&config, records);
//! let result = pipeline
//!     .process_visitor_registration(&registration, &LoggingProgressSink::default())
//!     .await;
//!
//! if !result.success {
//!     let result = pipeline
//!         .retry_failed_steps(result, &registration, &NoOpProgressSink)
//!         .await;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod recovery;
pub mod registration;
pub mod services;
pub mod upload;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{KioskConfig, RecordLinks};
    pub use crate::core::{
        NotificationPipelineResult, NotificationStep, StepId, StepStatus, StepStatusSummary,
    };
    pub use crate::errors::{ServiceError, VisitorflowError};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, NotificationPipeline,
        PipelineConfig, PipelineServices, ProgressSink,
    };
    pub use crate::recovery::{RecoveryConfig, ServiceKind, ServiceRecovery};
    pub use crate::registration::VisitorRegistration;
    pub use crate::services::{Backends, ChatService, EmailService, RecordStore};
    pub use crate::upload::FileUploadService;
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
