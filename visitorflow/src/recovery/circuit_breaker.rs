//! Per-service circuit breaker.
//!
//! `CLOSED` lets calls through and counts failures. Reaching the threshold
//! opens the circuit; while `OPEN`, calls inside the reset window are
//! rejected without running the operation. The first call after the window
//! moves to `HALF_OPEN` and probes the service once: success closes the
//! circuit, failure re-opens it with a fresh timestamp.

use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::errors::ServiceError;
use crate::utils::Timestamp;

/// Default number of failures that opens the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before a half-open probe.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls are rejected.
    Open,
    /// A single probe is allowed through.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Point-in-time view of a breaker, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Failures counted since the last success.
    pub failures: u32,
    /// When the most recent failure happened.
    pub last_failure_time: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure_time: Option<Timestamp>,
}

/// A fail-fast gate in front of one external service.
///
/// The lock guarding the counters is only held for the bookkeeping around a
/// call, never across the call itself.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a breaker with the default threshold and reset timeout.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(
            name,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_RESET_TIMEOUT,
            Arc::new(SystemClock),
        )
    }

    /// Creates a breaker with explicit settings.
    #[must_use]
    pub fn with_settings(
        name: impl Into<String>,
        failure_threshold: u32,
        reset_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            clock,
            inner: Mutex::new(BreakerState::default()),
        }
    }

    /// The service this breaker guards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns a snapshot of state, failure count and last failure time.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            failures: inner.failures,
            last_failure_time: inner.last_failure_time,
        }
    }

    /// Runs `operation` through the breaker.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.admit()?;

        match operation().await {
            Ok(result) => {
                self.on_success();
                Ok(result)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    fn admit(&self) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            if !self.cooldown_elapsed(inner.last_failure_time) {
                debug!(service = %self.name, "Circuit open, rejecting call");
                return Err(ServiceError::CircuitOpen);
            }
            inner.state = CircuitState::HalfOpen;
            info!(service = %self.name, "Circuit half-open, probing service");
        }

        Ok(())
    }

    fn cooldown_elapsed(&self, last_failure: Option<Timestamp>) -> bool {
        let Some(last) = last_failure else {
            return true;
        };
        let window = ChronoDuration::from_std(self.reset_timeout).unwrap_or(ChronoDuration::MAX);
        self.clock.now() - last >= window
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(service = %self.name, "Circuit closed");
        }
        inner.failures = 0;
        inner.state = CircuitState::Closed;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure_time = Some(self.clock.now());

        if inner.failures >= self.failure_threshold {
            if inner.state != CircuitState::Open {
                warn!(
                    service = %self.name,
                    failures = inner.failures,
                    "Circuit breaker opened"
                );
            }
            inner.state = CircuitState::Open;
        }
    }
}
