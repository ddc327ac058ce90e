// Retry logic for probe-internal attempts
use crate::application::constants::{
    DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_ATTEMPTS,
};
use crate::domain::ProbeError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given backoff delay
    Retry(Duration),
    /// Do not retry, attempts exhausted
    Exhausted,
}

/// Bounded retry policy for probes
///
/// Delays between attempts are always waited on together with the probe's
/// cancellation signal, so retries never outlive the per-probe timeout.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempts including the first (minimum 1)
    /// * `base_delay` - Delay before the second attempt
    /// * `backoff_factor` - Multiplier applied per further attempt
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
    /// ```
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether attempt number `attempt` (0-based, just failed) gets a retry
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ attempt) * (1.0 ± 0.1)
    ///
    /// Jitter is seeded by `key` so the same probe always backs off the same way.
    pub fn should_retry(&self, key: &str, attempt: u32) -> RetryDecision {
        if attempt + 1 >= self.max_attempts {
            return RetryDecision::Exhausted;
        }

        let base_ms = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);

        // ±10% jitter to avoid synchronized retries across probes
        let jitter_seed = key.chars().map(|c| c as u32).sum::<u32>() + attempt;
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        RetryDecision::Retry(Duration::from_millis((base_ms * jitter_factor) as u64))
    }

    /// Run `op` until it succeeds, attempts are exhausted, or `cancel` fires
    ///
    /// # Errors
    /// - ProbeError::Cancelled as soon as `cancel` fires (even mid-delay)
    /// - the last attempt's error once attempts are exhausted
    pub async fn retry<T, F, Fut>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, ProbeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProbeError>>,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                result = op(attempt) => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => err,
            };

            match self.should_retry(key, attempt) {
                RetryDecision::Retry(delay) => {
                    debug!(
                        key = %key,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    warn!(
                        key = %key,
                        attempts = attempt + 1,
                        error = %err,
                        "Max retry attempts reached"
                    );
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_MAX_ATTEMPTS,
            DEFAULT_RETRY_BASE_DELAY,
            DEFAULT_RETRY_BACKOFF_FACTOR,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn test_should_retry_until_exhausted() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);

        assert!(matches!(policy.should_retry("db", 0), RetryDecision::Retry(_)));
        assert!(matches!(policy.should_retry("db", 1), RetryDecision::Retry(_)));
        assert_eq!(policy.should_retry("db", 2), RetryDecision::Exhausted);
    }

    #[test]
    fn test_backoff_grows_within_jitter_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0);

        let RetryDecision::Retry(first) = policy.should_retry("db", 0) else {
            panic!("expected retry");
        };
        let RetryDecision::Retry(third) = policy.should_retry("db", 2) else {
            panic!("expected retry");
        };

        assert!(first >= Duration::from_millis(90) && first <= Duration::from_millis(110));
        assert!(third >= Duration::from_millis(360) && third <= Duration::from_millis(440));
    }

    #[test]
    fn test_jitter_is_deterministic_per_key() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.should_retry("redis", 0), policy.should_retry("redis", 0));
    }

    #[test]
    fn test_none_policy_never_retries() {
        assert_eq!(RetryPolicy::none().should_retry("x", 0), RetryDecision::Exhausted);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5), 1.0);
        let calls = AtomicU32::new(0);

        let result = policy
            .retry("flaky", &CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(ProbeError::Connection("refused".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error_when_exhausted() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), 1.0);

        let result: Result<(), _> = policy
            .retry("down", &CancellationToken::new(), |attempt| async move {
                Err(ProbeError::Connection(format!("attempt {}", attempt)))
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "Connection failed: attempt 1");
    }

    #[tokio::test]
    async fn test_retry_delay_honors_cancellation() {
        // Long backoff: without cancellation this would wait ~10s
        let policy = RetryPolicy::new(3, Duration::from_secs(10), 1.0);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = policy
            .retry("slow", &cancel, |_| async {
                Err(ProbeError::Connection("refused".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ProbeError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
