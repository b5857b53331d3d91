// rust/worker-core/src/retry.rs

//! Backoff between registration rounds.
//!
//! A round is one pass over every configured channel. When a round ends
//! with a retryable error the caller waits and starts another, with the
//! delay growing exponentially up to a cap.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RegistrationRetryConfig;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per retry.
    pub backoff_multiplier: f64,
    /// Stretch delays by up to 25% so restarted fleets do not retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RegistrationRetryConfig::default())
    }
}

impl From<&RegistrationRetryConfig> for RetryConfig {
    fn from(config: &RegistrationRetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl RetryConfig {
    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            capped * (1.0 + jitter_fraction(attempt) * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Value in `[0, 1)` derived from the attempt number and the process id,
/// so different workers pick different jitter for the same attempt.
fn jitter_fraction(attempt: u32) -> f64 {
    let mut x = u64::from(attempt) ^ (u64::from(std::process::id()) << 32);
    // splitmix64 finalizer
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

/// Outcome of one attempt inside [`retry_async`].
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Ok(T),
    /// Failed, another attempt may succeed.
    Retry(E),
    /// Failed for good.
    Fail(E),
}

impl<T, E> RetryResult<T, E> {
    /// Classifies a result with `retryable`.
    pub fn classify(result: Result<T, E>, retryable: impl FnOnce(&E) -> bool) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) if retryable(&e) => Self::Retry(e),
            Err(e) => Self::Fail(e),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Retry(e) | Self::Fail(e) => Err(e),
        }
    }
}

/// Runs `operation` until it succeeds, fails for good, or retries run out.
/// The last error is returned when retries are exhausted.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RetryResult<T, E>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            RetryResult::Ok(value) => return Ok(value),
            RetryResult::Fail(error) => return Err(error),
            RetryResult::Retry(error) => {
                if !config.should_retry(attempt) {
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed: {}; retrying",
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    #[test]
    fn test_from_registration_config() {
        let config = RetryConfig::from(&RegistrationRetryConfig {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 1.5,
            jitter: false,
        });
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(200));
        assert_eq!(config.max_delay, Duration::from_millis(5000));
        assert!(!config.jitter);
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert!(!config.should_retry(0));
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn test_exponential_delays_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(9), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig {
            jitter: true,
            max_retries: 8,
            ..fast(8)
        };
        for attempt in 0..8 {
            let delay = config.delay_for_attempt(attempt);
            assert!(delay >= Duration::from_millis(1));
            assert!(delay <= Duration::from_micros(1250));
        }
    }

    #[test]
    fn test_classify() {
        let r: RetryResult<i32, &str> = RetryResult::classify(Err("busy"), |_| true);
        assert!(matches!(r, RetryResult::Retry("busy")));
        let r: RetryResult<i32, &str> = RetryResult::classify(Err("bad config"), |_| false);
        assert!(matches!(r, RetryResult::Fail("bad config")));
        let r: RetryResult<i32, &str> = RetryResult::classify(Ok(1), |_| false);
        assert_eq!(r.into_result(), Ok(1));
    }

    #[tokio::test]
    async fn test_retry_async_eventual_success() {
        let calls = AtomicU32::new(0);
        let result = retry_async(&fast(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    RetryResult::Retry("not yet")
                } else {
                    RetryResult::Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_fail_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_async(&fast(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { RetryResult::Fail("fatal") }
        })
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_async_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_async(&fast(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { RetryResult::Retry("always fails") }
        })
        .await;

        assert_eq!(result, Err("always fails"));
        // Initial attempt + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
