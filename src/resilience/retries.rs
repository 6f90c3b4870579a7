//! Retry with backoff.
//!
//! # Algorithm
//! ```text
//! invoke operation
//!     → Ok: return (log recovery if this was a retry)
//!     → Err and budget spent: return the error
//!     → Err matching NON_RETRYABLE: return the error
//!     → Err matching RETRYABLE: sleep delay(k), invoke again
//!     → anything else: return the error
//! ```
//!
//! At most `max_attempts + 1` invocations. The wrapped operation must be safe
//! to repeat; that is the caller's concern.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::{BackoffKind, BackoffPolicy, ExponentialBackoff};
use crate::resilience::patterns::{matches_any, Pattern};

/// Authentication, permission and client errors. Checked first.
pub const NON_RETRYABLE: &[Pattern] = &[
    Pattern::Status("400"),
    Pattern::Status("401"),
    Pattern::Status("403"),
    Pattern::Status("404"),
    Pattern::Status("422"),
    Pattern::Phrase("unauthorized"),
    Pattern::Phrase("authentication"),
    Pattern::Phrase("invalid token"),
    Pattern::Phrase("forbidden"),
    Pattern::Phrase("permission denied"),
    Pattern::Phrase("missing permissions"),
    Pattern::Phrase("bad request"),
    Pattern::Phrase("not found"),
    Pattern::Phrase("validation"),
];

/// Network, rate-limit, server and timeout errors.
///
/// Covers every pattern of the classifier's transient categories.
pub const RETRYABLE: &[Pattern] = &[
    Pattern::Phrase("econnrefused"),
    Pattern::Phrase("econnreset"),
    Pattern::Phrase("enotfound"),
    Pattern::Phrase("enetunreach"),
    Pattern::Phrase("ehostunreach"),
    Pattern::Phrase("epipe"),
    Pattern::Phrase("socket hang up"),
    Pattern::Phrase("connection refused"),
    Pattern::Phrase("connection reset"),
    Pattern::Phrase("connection closed"),
    Pattern::Phrase("dns"),
    Pattern::Phrase("network"),
    Pattern::Phrase("transport error"),
    Pattern::Status("429"),
    Pattern::Phrase("rate limit"),
    Pattern::Phrase("ratelimit"),
    Pattern::Phrase("rate-limit"),
    Pattern::Phrase("too many requests"),
    Pattern::Phrase("quota exceeded"),
    Pattern::Status("500"),
    Pattern::Status("502"),
    Pattern::Status("503"),
    Pattern::Status("504"),
    Pattern::Phrase("internal server error"),
    Pattern::Phrase("bad gateway"),
    Pattern::Phrase("service unavailable"),
    Pattern::Phrase("gateway timeout"),
    Pattern::Phrase("timeout"),
    Pattern::Phrase("timed out"),
    Pattern::Phrase("etimedout"),
    Pattern::Phrase("deadline exceeded"),
];

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Retryable,
    NonRetryable,
}

/// Decide retry eligibility from a failure message. Unmatched text is not retried.
pub fn retry_eligibility(message: &str) -> Eligibility {
    if matches_any(NON_RETRYABLE, message) {
        Eligibility::NonRetryable
    } else if matches_any(RETRYABLE, message) {
        Eligibility::Retryable
    } else {
        Eligibility::NonRetryable
    }
}

/// Suspends the calling flow between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap_or_else(PoisonError::into_inner).push(delay);
    }
}

/// Retry parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryOptions {
    /// Attempts allowed after the first invocation.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        let curve = ExponentialBackoff::new(
            Duration::from_millis(config.base_delay_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_delay_ms),
        );
        let backoff = match config.policy {
            BackoffKind::Fixed => BackoffPolicy::fixed(curve),
            BackoffKind::Jittered => BackoffPolicy::jittered(curve, config.jitter_ratio),
        };
        Self {
            max_attempts: config.max_attempts,
            backoff,
        }
    }
}

/// Generic retry-with-backoff executor.
#[derive(Clone)]
pub struct RetryHandler {
    options: Arc<ArcSwap<RetryOptions>>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandler")
            .field("options", &**self.options.load())
            .finish_non_exhaustive()
    }
}

impl RetryHandler {
    pub fn new(options: RetryOptions) -> Self {
        Self::with_sleeper(options, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(options: RetryOptions, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            options: Arc::new(ArcSwap::from_pointee(options)),
            sleeper,
        }
    }

    /// Current default options.
    pub fn options(&self) -> RetryOptions {
        **self.options.load()
    }

    /// Swap the default options; in-flight retries keep the ones they started with.
    pub fn update_options(&self, options: RetryOptions) {
        self.options.store(Arc::new(options));
    }

    /// Run `op` under the default options.
    pub async fn retry<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let options = self.options();
        self.retry_with(operation, &options, op).await
    }

    /// Run `op` under explicit options.
    pub async fn retry_with<T, E, F, Fut>(
        &self,
        operation: &str,
        options: &RetryOptions,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            metrics::record_retry_attempt(operation);
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(operation, attempts = attempt + 1, "Operation recovered after retry");
                        metrics::record_retry_outcome(operation, "recovered");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= options.max_attempts {
                        tracing::warn!(
                            operation,
                            attempts = attempt + 1,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        metrics::record_retry_outcome(operation, "exhausted");
                        return Err(err);
                    }

                    let message = err.to_string();
                    if retry_eligibility(&message) == Eligibility::NonRetryable {
                        tracing::debug!(operation, error = %message, "Failure is not retryable");
                        metrics::record_retry_outcome(operation, "non_retryable");
                        return Err(err);
                    }

                    let delay = options.backoff.delay(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = options.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Operation failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recording_handler() -> (RetryHandler, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let handler = RetryHandler::with_sleeper(RetryOptions::default(), sleeper.clone());
        (handler, sleeper)
    }

    #[test]
    fn test_eligibility_lists() {
        assert_eq!(retry_eligibility("HTTP 503: Service Unavailable"), Eligibility::Retryable);
        assert_eq!(retry_eligibility("connect ECONNREFUSED"), Eligibility::Retryable);
        assert_eq!(retry_eligibility("request timed out"), Eligibility::Retryable);
        assert_eq!(retry_eligibility("HTTP 401: Unauthorized"), Eligibility::NonRetryable);
        assert_eq!(retry_eligibility("HTTP 404: not found"), Eligibility::NonRetryable);
        // Non-retryable list wins over the retryable one.
        assert_eq!(retry_eligibility("403 forbidden (network policy)"), Eligibility::NonRetryable);
        // Fail-safe default.
        assert_eq!(retry_eligibility("something odd happened"), Eligibility::NonRetryable);
    }

    #[tokio::test]
    async fn test_transient_phrases_are_retried() {
        for message in [
            "DNS lookup failed for discord.com",
            "quota exceeded for project",
            "context deadline exceeded",
            "connection closed by peer",
            "write EPIPE",
            "ratelimit hit",
        ] {
            let (handler, sleeper) = recording_handler();
            let calls = AtomicU32::new(0);

            let result: Result<(), String> = handler
                .retry("post", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err(message.to_string()) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 4, "{}", message);
            assert_eq!(sleeper.recorded().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_non_retryable_runs_once() {
        let (handler, sleeper) = recording_handler();
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = handler
            .retry("post", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("HTTP 401: Unauthorized".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let (handler, sleeper) = recording_handler();
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = handler
            .retry("post", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("HTTP 503: Service Unavailable".to_string())
                    } else {
                        Ok("sent")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let (handler, sleeper) = recording_handler();
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = handler
            .retry("post", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("ECONNRESET #{}", n)) }
            })
            .await;

        assert_eq!(result, Err("ECONNRESET #3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_options_override() {
        let (handler, sleeper) = recording_handler();
        let calls = AtomicU32::new(0);
        let options = RetryOptions {
            max_attempts: 1,
            backoff: BackoffPolicy::fixed(ExponentialBackoff::new(
                Duration::from_millis(10),
                2.0,
                Duration::from_millis(15),
            )),
        };

        let result: Result<(), String> = handler
            .retry_with("post", &options, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("429 too many requests".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(10)]);
    }

    #[test]
    fn test_options_from_config() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 200,
            backoff_multiplier: 3.0,
            max_delay_ms: 1000,
            policy: BackoffKind::Fixed,
            jitter_ratio: 0.3,
        };
        let options = RetryOptions::from(&config);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.backoff.delay(1), Duration::from_millis(600));
        assert_eq!(options.backoff.delay(2), Duration::from_millis(1000));

        let handler = RetryHandler::default();
        handler.update_options(options);
        assert_eq!(handler.options().max_attempts, 5);
    }
}
