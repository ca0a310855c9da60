use std::future::Future;
use std::time::Duration;

use crate::error::EtlError;

/// Exponential backoff policy for transient operations (DB round-trips,
/// filesystem moves). Defaults match the original's `@retry()` decorator:
/// 3 attempts, starting at 250ms, doubling each time.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { attempts: 3, initial_delay: Duration::from_millis(250), backoff: 2.0 }
    }
}

impl RetryPolicy {
    /// Runs `op` up to `self.attempts` times, sleeping with exponential
    /// backoff between attempts. Stops immediately - without sleeping or
    /// retrying - on a non-retryable `EtlError` (file errors and code
    /// defects), mirroring the original's `FILE_ERROR_EXCEPTIONS` guard
    /// inside its otherwise-blanket `except Exception` retry loop.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, EtlError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EtlError>>,
    {
        let mut wait = self.initial_delay;
        let mut last_err = None;

        for attempt in 0..self.attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < self.attempts {
                        tokio::time::sleep(wait).await;
                        wait = Duration::from_secs_f64(wait.as_secs_f64() * self.backoff);
                    }
                }
            }
        }

        Err(last_err.expect("loop runs at least once"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let policy = RetryPolicy { attempts: 3, initial_delay: Duration::from_millis(1), backoff: 2.0 };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, EtlError>(42) }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let policy = RetryPolicy { attempts: 3, initial_delay: Duration::from_millis(1), backoff: 2.0 };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<i32, _>(EtlError::MissingHeader {
                        filename: "f.csv".to_string(),
                        missing: vec!["id".to_string()],
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_on_retryable_error() {
        let policy = RetryPolicy { attempts: 3, initial_delay: Duration::from_millis(1), backoff: 2.0 };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>(EtlError::ConnectionTimeout(Duration::from_secs(1))) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
