//! Named external services, each behind its own breaker and retry policy.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::{
    CircuitBreaker, CircuitSnapshot, CircuitState, DEFAULT_FAILURE_THRESHOLD,
};
use super::clock::{Clock, SystemClock};
use super::retry::{with_retry, RetryConfig};
use crate::errors::ServiceError;

/// External services the kiosk talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Transactional email provider.
    Email,
    /// Work-management record store.
    Monday,
    /// Team chat webhook.
    Chat,
}

impl ServiceKind {
    /// Stable name used in logs and status maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Monday => "monday",
            Self::Chat => "chat",
        }
    }

    /// Failure fragments that must not be retried for this service.
    #[must_use]
    pub const fn terminal_markers(self) -> &'static [&'static str] {
        match self {
            Self::Email => &["authentication", "unauthorized"],
            Self::Monday => &["rate limit", "429"],
            Self::Chat => &["webhook", "400"],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry tuning for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTuning {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
}

/// Breaker and retry settings for the recovery facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Failures that open a breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cooldown before a half-open probe, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// Retry delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff growth factor.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Email provider tuning.
    #[serde(default = "default_email_tuning")]
    pub email: ServiceTuning,
    /// Record store tuning.
    #[serde(default = "default_monday_tuning")]
    pub monday: ServiceTuning,
    /// Chat webhook tuning.
    #[serde(default = "default_chat_tuning")]
    pub chat: ServiceTuning,
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_email_tuning() -> ServiceTuning {
    ServiceTuning {
        max_retries: 2,
        base_delay_ms: 2000,
    }
}

fn default_monday_tuning() -> ServiceTuning {
    ServiceTuning {
        max_retries: 3,
        base_delay_ms: 1000,
    }
}

fn default_chat_tuning() -> ServiceTuning {
    ServiceTuning {
        max_retries: 2,
        base_delay_ms: 1500,
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            email: default_email_tuning(),
            monday: default_monday_tuning(),
            chat: default_chat_tuning(),
        }
    }
}

impl RecoveryConfig {
    /// Sets the breaker threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the breaker cooldown.
    #[must_use]
    pub fn with_reset_timeout_ms(mut self, timeout: u64) -> Self {
        self.reset_timeout_ms = timeout;
        self
    }

    /// Sets every service's base delay, keeping retry counts.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.email.base_delay_ms = delay;
        self.monday.base_delay_ms = delay;
        self.chat.base_delay_ms = delay;
        self
    }

    /// Tuning for `kind`.
    #[must_use]
    pub fn tuning(&self, kind: ServiceKind) -> ServiceTuning {
        match kind {
            ServiceKind::Email => self.email,
            ServiceKind::Monday => self.monday,
            ServiceKind::Chat => self.chat,
        }
    }

    /// Builds the retry policy for `kind`.
    #[must_use]
    pub fn retry_config(&self, kind: ServiceKind) -> RetryConfig {
        let tuning = self.tuning(kind);
        let markers = kind.terminal_markers();

        RetryConfig::new()
            .with_max_retries(tuning.max_retries)
            .with_base_delay_ms(tuning.base_delay_ms)
            .with_max_delay_ms(self.max_delay_ms)
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_retry_condition(move |err: &ServiceError| !err.mentions_any(markers))
    }
}

/// Health of one service, derived from its breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Breaker closed.
    Healthy,
    /// Breaker half-open.
    Degraded,
    /// Breaker open.
    Unhealthy,
}

impl From<CircuitState> for HealthStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => Self::Healthy,
            CircuitState::HalfOpen => Self::Degraded,
            CircuitState::Open => Self::Unhealthy,
        }
    }
}

/// Per-service health plus an overall rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Rollup across services.
    pub overall: HealthStatus,
    /// Health per service that has been used.
    pub services: BTreeMap<ServiceKind, HealthStatus>,
}

/// Routes calls to external services through breaker → retry → operation.
///
/// Breakers are created lazily on first use. One instance is meant to be
/// shared (behind an `Arc`) by every pipeline run in the process.
#[derive(Debug)]
pub struct ServiceRecovery {
    config: RecoveryConfig,
    clock: Arc<dyn Clock>,
    breakers: DashMap<ServiceKind, Arc<CircuitBreaker>>,
}

impl Default for ServiceRecovery {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl ServiceRecovery {
    /// Creates a facade using the system clock.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a facade with an explicit clock.
    #[must_use]
    pub fn with_clock(config: RecoveryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breakers: DashMap::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Returns the breaker for `kind`, creating it on first use.
    #[must_use]
    pub fn breaker(&self, kind: ServiceKind) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(kind)
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_settings(
                    kind.as_str(),
                    self.config.failure_threshold,
                    Duration::from_millis(self.config.reset_timeout_ms),
                    Arc::clone(&self.clock),
                ))
            })
            .clone()
    }

    /// Runs `operation` against `kind` with its breaker and retry policy.
    ///
    /// The breaker sees the whole retry sequence as one call.
    pub async fn execute<T, F, Fut>(&self, kind: ServiceKind, operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let breaker = self.breaker(kind);
        let retry = self.config.retry_config(kind);
        let retry = &retry;

        breaker
            .execute(move || with_retry(retry, kind.as_str(), operation))
            .await
    }

    /// Email provider calls. Authentication failures are not retried.
    pub async fn execute_email<T, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.execute(ServiceKind::Email, operation).await
    }

    /// Record store calls. Rate-limit failures are not retried.
    pub async fn execute_monday<T, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.execute(ServiceKind::Monday, operation).await
    }

    /// Chat webhook calls. Webhook configuration failures are not retried.
    pub async fn execute_chat<T, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.execute(ServiceKind::Chat, operation).await
    }

    /// Breaker snapshots for every service used so far.
    #[must_use]
    pub fn service_status(&self) -> BTreeMap<ServiceKind, CircuitSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (*entry.key(), entry.value().snapshot()))
            .collect()
    }

    /// Derives per-service and overall health.
    ///
    /// Overall is healthy when every service is, degraded when more than
    /// half are, unhealthy otherwise.
    #[must_use]
    pub fn check_service_health(&self) -> HealthReport {
        let services: BTreeMap<ServiceKind, HealthStatus> = self
            .service_status()
            .into_iter()
            .map(|(kind, snapshot)| (kind, HealthStatus::from(snapshot.state)))
            .collect();

        let total = services.len();
        let healthy = services
            .values()
            .filter(|s| **s == HealthStatus::Healthy)
            .count();

        let overall = if healthy == total {
            HealthStatus::Healthy
        } else if healthy * 2 > total {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport { overall, services }
    }
}
