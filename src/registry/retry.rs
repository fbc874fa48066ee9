//! Rate-limit retry policy.

use crate::types::{ArtiscopeError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to send a request that keeps getting rate limited, and how
/// long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            pause,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            pause: Duration::from_secs(2),
        }
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    RateLimited,
}

/// Run `op` until it completes, fails, or has been rate limited
/// `policy.max_attempts` times.
///
/// Errors from `op` are returned immediately; only [`Attempt::RateLimited`]
/// is retried.
pub async fn retry_rate_limited<T, F, Fut>(policy: &RetryPolicy, target: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op().await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::RateLimited => {
                if attempt < max_attempts {
                    debug!(
                        "Rate limited by {} (attempt {}/{}), pausing {:?}",
                        target, attempt, max_attempts, policy.pause
                    );
                    tokio::time::sleep(policy.pause).await;
                }
            }
        }
    }

    warn!("Giving up on {} after {} rate-limited attempts", target, max_attempts);
    Err(ArtiscopeError::RateLimited {
        url: target.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_exhaustion_after_exact_attempts() {
        for max in [1, 3, 5] {
            let calls = AtomicU32::new(0);
            let result: Result<()> = retry_rate_limited(&instant(max), "test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Attempt::RateLimited)
            })
            .await;

            match result {
                Err(ArtiscopeError::RateLimited { attempts, .. }) => assert_eq!(attempts, max),
                other => panic!("expected RateLimited, got {:?}", other),
            }
            assert_eq!(calls.load(Ordering::SeqCst), max);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_rate_limit() {
        let calls = AtomicU32::new(0);
        let value = retry_rate_limited(&instant(5), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(Attempt::RateLimited)
            } else {
                Ok(Attempt::Done(42))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_rate_limited(&instant(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ArtiscopeError::Unauthorized("test".into()))
        })
        .await;

        assert!(matches!(result, Err(ArtiscopeError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        let _: Result<()> =
            retry_rate_limited(&policy, "test", || async { Ok(Attempt::RateLimited) }).await;

        // Two pauses between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[test]
    fn test_policy_keeps_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 5);
    }
}
