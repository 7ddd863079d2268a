//! Generic retryable-operation combinator.
//!
//! Replaces ad hoc retry loops with one combinator parameterized by maximum
//! attempts and a backoff schedule. The terminal error carries the attempt
//! count so callers can report how hard the operation was tried.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Default initial delay for exponential backoff (500ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default maximum delay cap for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Exponential backoff schedule.
///
/// The delay before retry `n` (1-based) is
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied to the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied per failed attempt (typically 2.0).
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl Backoff {
    /// Delay to wait before retry `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Terminal error after exhausting all retry attempts.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempts: {last_error}")]
pub struct RetryError<E> {
    /// How many attempts were made (including the initial one).
    pub attempts: u32,
    /// The error from the final attempt.
    pub last_error: E,
}

/// Run `operation` up to `max_attempts` times with exponential backoff.
///
/// The closure receives the 1-based attempt number. The first failure of
/// each attempt schedules a backoff delay before the next; exhaustion
/// surfaces a [`RetryError`] wrapping the last underlying error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    backoff: Backoff,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    debug_assert!(max_attempts >= 1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = backoff.delay_for_attempt(attempt);
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(RetryError {
                    attempts: attempt,
                    last_error: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let backoff = Backoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_respects_cap() {
        let backoff = Backoff {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        };

        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let result: Result<u32, RetryError<&str>> =
            retry_with_backoff(3, Backoff::default(), |_| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, RetryError<&str>> =
            retry_with_backoff(3, Backoff::default(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("transient")
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_carries_attempt_count() {
        let result: Result<(), RetryError<&str>> =
            retry_with_backoff(3, Backoff::default(), |_| async { Err("down") }).await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "down");
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
