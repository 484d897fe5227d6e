//! Retry with exponential backoff.
//!
//! Wraps a fallible async operation and re-runs it on any error, waiting
//! `base_delay * 2^(attempt - 1)` between attempts. Errors are not
//! classified: every failure is retried until the attempt budget runs out.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::env_or;
use crate::error::FetchError;

// == Retry Config ==
/// Attempt budget and base delay for [`retry_with_backoff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each later one
    pub base_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Loads the retry settings from environment variables.
    ///
    /// # Environment Variables
    /// - `FETCH_MAX_ATTEMPTS` - Total attempts (default: 3)
    /// - `FETCH_BASE_DELAY_MS` - Base backoff delay in milliseconds (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_or("FETCH_MAX_ATTEMPTS", defaults.max_attempts),
            base_delay: Duration::from_millis(env_or(
                "FETCH_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

// == Retry With Backoff ==
/// Runs `operation` until it succeeds or the attempt budget is spent.
///
/// A zero `max_attempts` is treated as one attempt. After the final failure
/// the last error is returned inside [`FetchError::Exhausted`] without any
/// further wait. If `cancel` fires before an attempt or during a backoff
/// wait, the helper stops with [`FetchError::Cancelled`].
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, FetchError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "remote operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %err, "remote operation failed, giving up");
            return Err(FetchError::Exhausted {
                attempts: attempt,
                last_error: err,
            });
        }

        let delay = config.delay_for(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "remote operation failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FetchError::Cancelled { attempts: attempt });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_doubles() {
        let config = RetryConfig::new(5, Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
        assert_eq!(config.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_saturates() {
        let config = RetryConfig::new(100, Duration::from_secs(1));
        assert!(config.delay_for(80) >= Duration::from_secs(1 << 31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_with_backoff() {
        let config = RetryConfig::new(3, Duration::from_millis(1000));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();
        let mut attempt_times = Vec::new();

        let result = retry_with_backoff(&config, &CancellationToken::new(), || {
            let calls = calls.clone();
            attempt_times.push(started.elapsed());
            async move {
                match calls.fetch_add(1, Ordering::SeqCst) + 1 {
                    3 => Ok("orders"),
                    n => Err(format!("attempt {n} failed")),
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "orders");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            attempt_times,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry_with_backoff(&config, &CancellationToken::new(), || {
            let calls = calls.clone();
            async move { Err(format!("failure {}", calls.fetch_add(1, Ordering::SeqCst) + 1)) }
        })
        .await;

        match result {
            Err(FetchError::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "failure 3");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_does_not_wait() {
        let config = RetryConfig::default();
        let started = Instant::now();

        let result: Result<u8, FetchError<String>> =
            retry_with_backoff(&config, &CancellationToken::new(), || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let config = RetryConfig::new(5, Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = retry_with_backoff(&config, &cancel, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Cancelled { attempts: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), FetchError<String>> =
            retry_with_backoff(&RetryConfig::default(), &cancel, || async { Ok(()) }).await;

        assert!(matches!(result, Err(FetchError::Cancelled { attempts: 0 })));
    }
}
