//! Bounded retry with exponential backoff.
//!
//! An operation is attempted up to `max_retries + 1` times. Between attempt
//! `k` and `k + 1` the executor sleeps `min(base * multiplier^k, max)`.
//! A failure the retry condition rejects is returned immediately.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::errors::ServiceError;

/// Decides whether a failure is worth another attempt.
pub type RetryCondition = Arc<dyn Fn(&ServiceError) -> bool + Send + Sync>;

/// Budget for a single network call before it is cancelled.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(15);

/// Message fragments that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &["fetch", "network", "timeout", "500", "502", "503"];

/// Retries network, timeout and 5xx failures; everything else is terminal.
#[must_use]
pub fn default_retry_condition(error: &ServiceError) -> bool {
    error.mentions_any(TRANSIENT_MARKERS)
}

fn default_condition() -> RetryCondition {
    Arc::new(default_retry_condition)
}

/// Configuration for retry behavior.
#[derive(Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    #[serde(skip, default = "default_condition")]
    retry_condition: RetryCondition,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish_non_exhaustive()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retry_condition: default_condition(),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Replaces the retry condition.
    #[must_use]
    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ServiceError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }

    /// Total attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns true if the condition allows retrying `error`.
    #[must_use]
    pub fn is_retryable(&self, error: &ServiceError) -> bool {
        (self.retry_condition)(error)
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Decides what to do after the attempt with 0-based index `attempt` failed.
#[must_use]
pub fn should_retry(config: &RetryConfig, attempt: u32, error: &ServiceError) -> RetryDecision {
    if attempt >= config.max_retries {
        return RetryDecision::GiveUp;
    }
    if !config.is_retryable(error) {
        return RetryDecision::NotRetryable;
    }
    RetryDecision::Retry(config.delay_for_attempt(attempt))
}

/// Executes an operation with retry logic.
///
/// The last error is returned once the budget is spent or the retry
/// condition rejects a failure.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    key: &str,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => match should_retry(config, attempt, &e) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        key = %key,
                        attempt = attempt + 1,
                        of = config.max_attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                    return Err(e);
                }
            },
        }
    }
}

/// Sends a request under [`NETWORK_TIMEOUT`] and rejects non-2xx answers.
///
/// Dropping the in-flight request when the timer fires cancels it.
#[cfg(feature = "http")]
pub async fn send_checked(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, ServiceError> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| {
            ServiceError::timeout(format!("Request timeout after {}ms", timeout.as_millis()))
        })??;

    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::http(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
        ));
    }

    Ok(response)
}

/// Network-call variant of [`with_retry`].
///
/// `build` is invoked once per attempt since a request builder is consumed
/// by sending it.
#[cfg(feature = "http")]
pub async fn fetch_with_retry<F>(
    config: &RetryConfig,
    mut build: F,
) -> Result<reqwest::Response, ServiceError>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    with_retry(config, "fetch", || {
        let request = build();
        send_checked(request, NETWORK_TIMEOUT)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(retries: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(retries)
            .with_base_delay_ms(1)
            .with_max_delay_ms(5)
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 10_000);
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_max_delay_ms(10_000)
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_backoff_multiplier(3.0);

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(3000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_default_condition() {
        assert!(default_retry_condition(&ServiceError::other("fetch failed")));
        assert!(default_retry_condition(&ServiceError::timeout("Operation timeout")));
        assert!(default_retry_condition(&ServiceError::http(502, "Bad Gateway")));
        assert!(default_retry_condition(&ServiceError::network("reset")));
        assert!(!default_retry_condition(&ServiceError::http(404, "Not Found")));
        assert!(!default_retry_condition(&ServiceError::other("unauthorized")));
    }

    #[test]
    fn test_should_retry_decisions() {
        let config = fast_config(2);
        let transient = ServiceError::network("down");
        let terminal = ServiceError::http(401, "Unauthorized");

        assert!(matches!(should_retry(&config, 0, &transient), RetryDecision::Retry(_)));
        assert_eq!(should_retry(&config, 2, &transient), RetryDecision::GiveUp);
        assert_eq!(should_retry(&config, 0, &terminal), RetryDecision::NotRetryable);
    }

    #[tokio::test]
    async fn test_with_retry_success_first_try() {
        let config = RetryConfig::new();
        let mut calls = 0;

        let result = with_retry(&config, "test", || {
            calls += 1;
            async { Ok::<_, ServiceError>(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retry_success_after_failures() {
        let config = fast_config(5);
        let calls = AtomicU32::new(0);

        let result = with_retry(&config, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(ServiceError::network(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_runs_max_retries_plus_one() {
        for retries in 0..4 {
            let config = fast_config(retries);
            let calls = AtomicU32::new(0);

            let result: Result<(), _> = with_retry(&config, "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::network("always fails")) }
            })
            .await;

            assert_eq!(result, Err(ServiceError::network("always fails")));
            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let config = fast_config(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::http(400, "Bad Request")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_sleeps_backoff_delays() {
        let config = RetryConfig::new()
            .with_max_retries(3)
            .with_base_delay_ms(100)
            .with_max_delay_ms(250);
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = with_retry(&config, "timed", || async {
            Err(ServiceError::network("down"))
        })
        .await;

        // 100 + 200 + 250 (capped)
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(550));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[cfg(feature = "http")]
    mod http {
        use super::*;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        async fn serve_status(status_line: &'static str, hits: Arc<AtomicU32>) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    hits.fetch_add(1, Ordering::SeqCst);
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let response =
                        format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            format!("http://{addr}/")
        }

        #[tokio::test]
        async fn test_fetch_with_retry_converts_status_to_error() {
            let hits = Arc::new(AtomicU32::new(0));
            let url = serve_status("HTTP/1.1 503 Service Unavailable", hits.clone()).await;
            let client = reqwest::Client::new();
            let config = fast_config(2);

            let err = fetch_with_retry(&config, || client.get(&url))
                .await
                .unwrap_err();

            assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
            assert_eq!(hits.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn test_fetch_with_retry_passes_success_through() {
            let hits = Arc::new(AtomicU32::new(0));
            let url = serve_status("HTTP/1.1 200 OK", hits.clone()).await;
            let client = reqwest::Client::new();

            let response = fetch_with_retry(&fast_config(2), || client.get(&url))
                .await
                .unwrap();

            assert!(response.status().is_success());
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_client_errors_are_not_retried() {
            let hits = Arc::new(AtomicU32::new(0));
            let url = serve_status("HTTP/1.1 404 Not Found", hits.clone()).await;
            let client = reqwest::Client::new();

            let err = fetch_with_retry(&fast_config(2), || client.get(&url))
                .await
                .unwrap_err();

            assert_eq!(err, ServiceError::http(404, "Not Found"));
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }
}
