//! Failure recovery for calls to external services.
//!
//! This module provides:
//! - A bounded retry executor with exponential backoff
//! - A per-service circuit breaker
//! - The service recovery facade that binds the two per named service
//! - An error classifier for user-facing messages

mod circuit_breaker;
mod classifier;
mod clock;
mod retry;
mod service;

pub use circuit_breaker::{
    CircuitBreaker, CircuitSnapshot, CircuitState, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_RESET_TIMEOUT,
};
pub use classifier::{
    classify_error, create_user_friendly_error, ErrorClassification, ErrorType, Severity,
    UserFacingError,
};
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "http")]
pub use retry::{fetch_with_retry, send_checked};
pub use retry::{
    default_retry_condition, should_retry, with_retry, RetryCondition, RetryConfig,
    RetryDecision, NETWORK_TIMEOUT,
};
pub use service::{
    HealthReport, HealthStatus, RecoveryConfig, ServiceKind, ServiceRecovery, ServiceTuning,
};
