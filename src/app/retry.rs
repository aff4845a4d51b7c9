//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::{AppError, BlockchainError};

/// Growth factor between consecutive backoff delays
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 3;

/// Retry schedule: no delay before the first attempt, then
/// `base_delay * multiplier^(n-2)` before attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

/// Result of running an operation under a [`RetryPolicy`]
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: AppError },
}

impl<T> RetryOutcome<T> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Collapse exhaustion into a permanent remote failure.
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted {
                attempts,
                last_error,
            } => Err(AppError::Blockchain(BlockchainError::Permanent {
                attempts,
                message: last_error.message(),
            })),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000))
    }
}

impl RetryPolicy {
    /// A policy with the default multiplier. `max_attempts` is raised to 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Delay to wait before the given 1-based attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self
            .multiplier
            .checked_pow(attempt - 2)
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// `on_failure` observes every failed attempt, including the last one.
    /// Exhaustion is reported through the outcome, never raised.
    pub async fn execute<T, F, Fut, O>(&self, mut operation: F, mut on_failure: O) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
        O: FnMut(u32, &AppError),
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    on_failure(attempt, &error);
                    if attempt >= self.max_attempts {
                        return RetryOutcome::Exhausted {
                            attempts: attempt,
                            last_error: error,
                        };
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_in_ms = self.delay_before(attempt + 1).as_millis() as u64,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn transient(msg: &str) -> AppError {
        AppError::Blockchain(BlockchainError::Transient(msg.to_string()))
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(300));
        assert_eq!(policy.delay_before(4), Duration::from_millis(900));
        assert_eq!(policy.delay_before(5), Duration::from_millis(2_700));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.delay_before(90), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_custom_multiplier_and_floor() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10)).with_multiplier(2);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_before(4), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_attempts_and_spacing() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let started = Arc::new(Mutex::new(Vec::new()));
        let mut failures = Vec::new();

        let outcome: RetryOutcome<()> = policy
            .execute(
                |_| {
                    let started = Arc::clone(&started);
                    async move {
                        started.lock().unwrap().push(Instant::now());
                        Err(transient("boom"))
                    }
                },
                |attempt, _| failures.push(attempt),
            )
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(failures, vec![1, 2, 3]);

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 3);
        let first_gap = started[1] - started[0];
        let second_gap = started[2] - started[1];
        assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(150));
        assert!(second_gap >= Duration::from_millis(300) && second_gap < Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_retrying() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = Arc::new(Mutex::new(0u32));

        let outcome = policy
            .execute(
                |attempt| {
                    let calls = Arc::clone(&calls);
                    async move {
                        *calls.lock().unwrap() += 1;
                        if attempt < 2 {
                            Err(transient("nonce too low"))
                        } else {
                            Ok("0xdef")
                        }
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.into_result().unwrap(), "0xdef");
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_into_permanent_error() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let outcome: RetryOutcome<()> = policy
            .execute(|_| async { Err(transient("gas estimation failed")) }, |_, _| {})
            .await;

        match outcome.into_result() {
            Err(AppError::Blockchain(BlockchainError::Permanent { attempts, message })) => {
                assert_eq!(attempts, 1);
                assert_eq!(message, "gas estimation failed");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
