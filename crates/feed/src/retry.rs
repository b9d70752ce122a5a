//! Retry policy for window fetches
//!
//! Bounded exponential backoff without jitter. The delay after failed
//! attempt `i` (0-indexed) is `base_delay * m^i`, where `m` is 5 when
//! that failure was a rate limit and 2 otherwise.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use trending_core::{FetchError, FetchResult, RetryConfig};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub rate_limit_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            rate_limit_multiplier: 5,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Sleep before retrying after `error` on attempt `attempt`
    pub fn delay_for(&self, attempt: u32, error: &FetchError) -> Duration {
        let multiplier = if error.is_rate_limited() {
            self.rate_limit_multiplier
        } else {
            self.multiplier
        };
        self.base_delay.saturating_mul(multiplier.saturating_pow(attempt))
    }

    /// Run `operation` until it succeeds or attempts run out.
    /// The last error is returned once every attempt has failed.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> FetchResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt + 1, attempts);
                    }
                    return Ok(value);
                }
                Err(e) if attempt + 1 >= attempts => {
                    warn!("{} failed after {} attempts: {}", label, attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        "{} attempt {}/{} failed: {} (retrying in {:?})",
                        label,
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn rate_limited() -> FetchError {
        FetchError::Status { window: "1h".into(), status: 429 }
    }

    fn server_error() -> FetchError {
        FetchError::Status { window: "1h".into(), status: 500 }
    }

    // Paused-clock timers fire on millisecond ticks
    fn assert_waited(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(2),
            "waited {actual:?}, expected {expected:?}"
        );
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        assert_eq!(policy.delay_for(0, &server_error()), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, &server_error()), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, &server_error()), Duration::from_millis(400));

        assert_eq!(policy.delay_for(0, &rate_limited()), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, &rate_limited()), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2, &rate_limited()), Duration::from_millis(2_500));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig { max_attempts: 5, base_delay_ms: 10 });
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
        assert_eq!(policy.rate_limit_multiplier, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_backoff_timing() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::default();

        let recorded = Arc::clone(&calls);
        let result: FetchResult<()> = policy
            .run("window 1h", move |_| {
                recorded.lock().push(Instant::now());
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 429, .. })));

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_waited(calls[1] - calls[0], Duration::from_millis(100));
        assert_waited(calls[2] - calls[1], Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_before_exhausting() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let start = Instant::now();

        let result = policy
            .run("window 5m", |attempt| async move {
                if attempt < 2 {
                    Err(server_error())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_waited(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_does_not_sleep() {
        let policy = RetryPolicy::new(1, Duration::from_secs(60));
        let start = Instant::now();

        let result: FetchResult<()> = policy.run("once", |_| async { Err(server_error()) }).await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
