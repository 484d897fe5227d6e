//! Timing instrumentation for remote operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Result of a timed operation together with how long it took.
#[derive(Debug)]
pub struct Timed<T, E> {
    pub result: Result<T, E>,
    pub elapsed: Duration,
    pub succeeded: bool,
}

impl<T, E> Timed<T, E> {
    /// Drops the timing and hands back the operation's own result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Awaits `operation` and records its wall-clock duration.
///
/// Purely observational: a failure is passed through untouched.
pub async fn timed<T, E, Fut>(operation: Fut) -> Timed<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = operation.await;
    Timed {
        succeeded: result.is_ok(),
        elapsed: started.elapsed(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_success() {
        let timed = timed(async {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok::<_, String>(5)
        })
        .await;

        assert!(timed.succeeded);
        assert_eq!(timed.elapsed, Duration::from_millis(250));
        assert_eq!(timed.into_result(), Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_failure_is_propagated() {
        let timed = timed(async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Err::<u8, _>("timeout".to_string())
        })
        .await;

        assert!(!timed.succeeded);
        assert_eq!(timed.elapsed, Duration::from_millis(40));
        assert_eq!(timed.into_result(), Err("timeout".to_string()));
    }
}
