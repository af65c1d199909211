//! Bounded retry with exponential backoff.
//!
//! Wraps a single upstream call. Transient failures (429/403, network or
//! timeout errors) are retried after `base * 2^(attempt-1) + jitter`,
//! capped at a maximum delay. A Retry-After header from the server takes
//! precedence over the computed delay. 404 and every other failure class
//! propagate immediately without retrying.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{MetError, MetResult};

use super::scheduler::RequestScheduler;

/// Longest delay honored from a Retry-After header.
const RETRY_AFTER_CAP: Duration = Duration::from_secs(60);

/// Spread added to each backoff delay to avoid synchronized retries.
const JITTER_MAX_MS: u64 = 250;

/// Retry parameters, taken from [`crate::MetConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Execute `call` with up to `max_retries` additional attempts.
    ///
    /// A scheduler slot is acquired before every attempt, so retries count
    /// against the same outbound quota as first attempts.
    pub async fn execute<T, F, Fut>(
        &self,
        scheduler: &RequestScheduler,
        url: &str,
        call: F,
    ) -> MetResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = MetResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            scheduler.acquire_slot().await;

            let err = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(url, attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt > self.max_retries {
                warn!(url, attempts = attempt, error = %err, "retries exhausted");
                return Err(MetError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.backoff_delay(attempt, err.retry_after());
            warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );
            sleep(delay).await;
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(requested) = retry_after {
            return requested.min(RETRY_AFTER_CAP);
        }
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
        Duration::from_millis(exp_ms + jitter_ms(JITTER_MAX_MS)).min(self.max_delay)
    }
}

/// Cheap jitter without a PRNG dependency.
fn jitter_ms(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max.max(1)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::client::scheduler::SchedulerConfig;

    fn test_scheduler() -> RequestScheduler {
        RequestScheduler::new(SchedulerConfig {
            max_requests: 100,
            time_window: Duration::from_secs(60),
            min_interval: Duration::from_millis(1),
            window_margin: Duration::from_millis(1),
        })
    }

    fn transient(status: u16) -> MetError {
        MetError::Http {
            status,
            url: "https://example.test/objects/1".into(),
            retry_after: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_twice_then_success() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(5));
        let scheduler = test_scheduler();
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute(&scheduler, "https://example.test/objects/1", || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(transient(429))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(5));
        let scheduler = test_scheduler();
        let attempts = AtomicU32::new(0);

        let result: MetResult<u32> = policy
            .execute(&scheduler, "https://example.test/objects/404", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(MetError::NotFound {
                    url: "https://example.test/objects/404".into(),
                })
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_status_is_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(5));
        let scheduler = test_scheduler();
        let attempts = AtomicU32::new(0);

        let result: MetResult<u32> = policy
            .execute(&scheduler, "https://example.test/objects/1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(transient(500))
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_status_and_url() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(5));
        let scheduler = test_scheduler();

        let result: MetResult<u32> = policy
            .execute(&scheduler, "https://example.test/objects/1", || async {
                Err(transient(429))
            })
            .await;

        match result.unwrap_err() {
            MetError::RetriesExhausted { url, attempts, source } => {
                assert_eq!(url, "https://example.test/objects/1");
                assert_eq!(attempts, 3);
                assert_eq!(source.status(), Some(429));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_backoff_delay_growth_and_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(800));
        let d1 = policy.backoff_delay(1, None);
        let d3 = policy.backoff_delay(3, None);
        let d6 = policy.backoff_delay(6, None);

        assert!(d1 >= Duration::from_millis(100));
        assert!(d3 >= Duration::from_millis(400));
        assert_eq!(d6, Duration::from_millis(800));
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(30));
        let d = policy.backoff_delay(1, Some(Duration::from_secs(7)));
        assert_eq!(d, Duration::from_secs(7));

        let capped = policy.backoff_delay(1, Some(Duration::from_secs(600)));
        assert_eq!(capped, RETRY_AFTER_CAP);
    }
}
