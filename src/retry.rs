use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for the data-acquisition layer. `max_retries` counts
/// retries after the first attempt and deliberately stays an f64 so
/// misconfigured values (negative, fractional, NaN, infinite) can be
/// normalized instead of rejected.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: f64,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2.0,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Effective attempt count: `max(1, floor(clamp(max_retries, 0, inf)) + 1)`.
    /// NaN clamps to zero retries; the cast saturates for infinite values.
    pub fn attempts(&self) -> u32 {
        let clamped = if self.max_retries.is_nan() {
            0.0
        } else {
            self.max_retries.max(0.0)
        };
        (clamped.floor() as u32).saturating_add(1)
    }

    /// Exponential backoff: `base_delay * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Runs `op` until it succeeds or the policy's attempts are exhausted,
/// sleeping with exponential backoff between failures. Generic over the
/// operation so the data layer and tests can wrap anything async.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, attempts, "attempt failed, retrying in {:?}: {}", delay, err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_retries: f64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn attempts_normalize_bad_configuration() {
        assert_eq!(policy(-5.0).attempts(), 1);
        assert_eq!(policy(0.0).attempts(), 1);
        assert_eq!(policy(2.0).attempts(), 3);
        assert_eq!(policy(2.9).attempts(), 3);
        assert_eq!(policy(f64::NAN).attempts(), 1);
        assert_eq!(policy(f64::NEG_INFINITY).attempts(), 1);
        assert_eq!(policy(f64::INFINITY).attempts(), u32::MAX);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = RetryPolicy {
            max_retries: 3.0,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = with_backoff(&policy(5.0), || {
            calls.set(calls.get() + 1);
            let call = calls.get();
            async move {
                if call < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn surfaces_the_last_error_after_exhaustion() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = with_backoff(&policy(1.0), || {
            calls.set(calls.get() + 1);
            async { Err("still broken".to_string()) }
        })
        .await;
        assert_eq!(result, Err("still broken".to_string()));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn negative_retries_mean_a_single_attempt() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = with_backoff(&policy(-1.0), || {
            calls.set(calls.get() + 1);
            async { Err("broken".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
