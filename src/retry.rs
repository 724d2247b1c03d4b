//! Bounded retry with backoff
//!
//! Every network-facing operation goes through [`with_retry`], so the retry
//! contract (attempt budget, backoff after failure, pacing after success) is
//! the same everywhere and can be tested without a network or a real clock.
//!
//! # Example
//!
//! ```no_run
//! use bookcorpus_dl::config::RetryConfig;
//! use bookcorpus_dl::retry::{IsRetryable, TokioSleeper, with_retry};
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl IsRetryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, &TokioSleeper, "https://example.com", || async {
//!     Ok::<_, Flaky>(42)
//! })
//! .await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, overloaded servers) return `true`.
/// Permanent failures (missing resource, forbidden) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            // A request that could not be built (bad URL, unsupported scheme) never will be
            FetchError::Transport { source, .. } => !source.is_builder(),
            FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => is_retryable_status(*status),
            FetchError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            // Already the end of a retry loop
            FetchError::Exhausted { .. } => false,
        }
    }
}

/// Whether an HTTP status is worth another attempt (408, 429, 5xx)
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

/// Source of delays between attempts
///
/// Production code uses [`TokioSleeper`]; tests inject a recording fake.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Final error of a retried operation, with the number of attempts made
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts made, including the first one
    pub attempts: u32,
    /// Error returned by the last attempt
    pub error: E,
}

/// Run `operation` until it succeeds, fails permanently, or the attempt budget is spent
///
/// * After a failed attempt with budget left, waits `backoff` (growing by
///   `backoff_multiplier`, capped at `max_backoff`, optionally jittered).
/// * After a successful attempt, waits `success_delay` so that a busy worker
///   does not hammer the remote host.
/// * `label` identifies the operation in log lines (usually the URL).
///
/// A `max_attempts` of zero is treated as one attempt.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    label: &str,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.backoff;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(op = label, attempts = attempt, "succeeded after retry");
                }
                sleeper.sleep(config.success_delay).await;
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    op = label,
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "attempt failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                sleeper.sleep(wait).await;

                let next = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next.min(config.max_backoff);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(op = label, error = %e, attempts = attempt, "gave up");
                } else {
                    tracing::error!(op = label, error = %e, "failed with non-retryable error");
                }
                return Err(RetryFailure {
                    attempts: attempt,
                    error: e,
                });
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    /// Records requested sleeps instead of waiting
    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_backoff: Duration::from_secs(60),
            success_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn success_first_try_only_paces() {
        let sleeper = RecordingSleeper::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config(), &sleeper, "op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(1)],
            "only the success pacing delay"
        );
    }

    #[tokio::test]
    async fn two_failures_then_success_on_third_attempt() {
        let sleeper = RecordingSleeper::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config(), &sleeper, "op", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(1)
            ]
        );
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts_total() {
        let sleeper = RecordingSleeper::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config(), &sleeper, "op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, TestError::Transient));
        assert_eq!(counter.load(Ordering::SeqCst), 3, "three attempts in total");
        assert_eq!(
            sleeper.sleeps.lock().unwrap().len(),
            2,
            "backoff between attempts, none after the last"
        );
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let sleeper = RecordingSleeper::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config(), &sleeper, "op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Permanent)
            }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backoff_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            backoff: Duration::from_millis(100),
            backoff_multiplier: 10.0,
            max_backoff: Duration::from_millis(500),
            success_delay: Duration::ZERO,
            jitter: false,
        };
        let sleeper = RecordingSleeper::default();

        let _ = with_retry(&config, &sleeper, "op", || async {
            Err::<i32, _>(TestError::Transient)
        })
        .await;

        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[tokio::test]
    async fn zero_max_attempts_still_tries_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..config()
        };
        let sleeper = RecordingSleeper::default();
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&config, &sleeper, "op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tokio_sleeper_waits() {
        let start = std::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn add_jitter_stays_within_bounds() {
        let delay = Duration::from_millis(50);
        for i in 0..200 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay, "iteration {i}: {jittered:?} < {delay:?}");
            assert!(jittered <= delay * 2, "iteration {i}: {jittered:?} > 2x");
        }
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn status_classification() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should be retried");
        }
        for status in [400, 401, 403, 404, 410] {
            assert!(!is_retryable_status(status), "{status} is permanent");
        }
    }

    #[test]
    fn fetch_error_retryability() {
        let busy = FetchError::Status {
            url: "u".into(),
            status: 503,
        };
        assert!(busy.is_retryable());

        let gone = FetchError::Status {
            url: "u".into(),
            status: 404,
        };
        assert!(!gone.is_retryable());

        let reset = FetchError::Io {
            url: "u".into(),
            path: "p".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        };
        assert!(reset.is_retryable());

        let denied = FetchError::Io {
            url: "u".into(),
            path: "p".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!denied.is_retryable());

        let stalled = FetchError::Timeout {
            url: "u".into(),
            after: Duration::from_secs(60),
        };
        assert!(stalled.is_retryable());

        let unbuildable = FetchError::Transport {
            url: "not a url".into(),
            source: reqwest::Client::new().get("not a url").build().unwrap_err(),
        };
        assert!(!unbuildable.is_retryable());

        let exhausted = FetchError::Exhausted {
            url: "u".into(),
            attempts: 3,
            source: Box::new(busy),
        };
        assert!(!exhausted.is_retryable());
    }
}
