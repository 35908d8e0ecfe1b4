//! Bounded exponential back-off for chain reads.

use crate::error::{RouterError, RouterResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): doubled each time, capped,
    /// plus up to 10% jitter so concurrent batches do not retry in lockstep.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
        let base = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = (base.as_millis() / 10) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Retry an async chain operation while it fails with a retryable error.
pub async fn retry_async<F, Fut, T>(label: &str, policy: &RetryPolicy, mut op: F) -> RouterResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = RouterResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt as u32 - 1);
                debug!("{} failed (attempt {}/{}): {} - retrying in {:?}", label, attempt, attempts, e, delay);
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Shorthand for a transport failure, used by tests and fakes.
pub fn transport_error(msg: impl Into<String>) -> RouterError {
    RouterError::Transport(msg.into())
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicUsize::new(0);
        let res = retry_async("op", &fast_policy(4), |_| {
            let current = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                if current < 2 {
                    Err(transport_error("flaky"))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert_eq!(res, Ok(7));
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let counter = AtomicUsize::new(0);
        let res: RouterResult<u32> = retry_async("op", &fast_policy(3), |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Err(transport_error("down")) }
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_deterministic_errors_not_retried() {
        let counter = AtomicUsize::new(0);
        let res: RouterResult<u32> = retry_async("op", &fast_policy(5), |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Err(RouterError::decode("slot0", "short return data")) }
        })
        .await;

        assert!(matches!(res, Err(RouterError::Decode { .. })));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = policy.delay_for(0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));
        let second = policy.delay_for(1);
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(220));
        let capped = policy.delay_for(10);
        assert!(capped >= Duration::from_millis(300) && capped <= Duration::from_millis(330));
    }
}
