//! Bounded retry with explicit error classification.
//!
//! Retry/skip decisions are data: a pure classification function maps each
//! error to [`ErrorClass`], and the policy only re-runs operations whose
//! failure is declared transient. Exhaustion returns the last error to the
//! caller, which degrades that unit of work to "missing" — a retry layer
//! never aborts a whole run.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Whether a failed operation is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

/// Retry parameters for one kind of unit of work.
///
/// The observed polite-crawling delay for these sites is 3–6 seconds between
/// attempts; jitter spreads concurrent retries so they do not stampede.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter_ms,
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.jitter_ms)
        };
        self.base_delay + Duration::from_millis(jitter)
    }

    /// Run `operation` up to `max_attempts` times. A `Fatal` classification
    /// aborts immediately; retryable failures sleep the policy delay first.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        label: &str,
        classify: C,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if classify(&error) == ErrorClass::Fatal {
                        warn!(%error, label, attempt, "fatal error, not retrying");
                        return Err(error);
                    }
                    if attempt >= max_attempts {
                        warn!(%error, label, attempt, "retries exhausted");
                        return Err(error);
                    }
                    let delay = self.next_delay();
                    warn!(
                        %error,
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10), 0)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = fast_policy(3)
            .execute("unit", |_| ErrorClass::Retryable, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("flaky")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = fast_policy(3)
            .execute("unit", |_| ErrorClass::Retryable, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;
        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_abort_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = fast_policy(5)
            .execute("unit", |_| ErrorClass::Fatal, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("404") }
            })
            .await;
        assert_eq!(result, Err("404"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = fast_policy(0)
            .execute("unit", |_| ErrorClass::Retryable, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
