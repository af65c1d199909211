//! Sliding-window request scheduler.
//!
//! Serializes outbound calls so the upstream API never sees more than
//! `max_requests` calls per rolling `time_window`, and never two calls
//! closer together than `min_interval`. Tickets live in a `VecDeque`
//! behind a tokio mutex; waiting callers sleep with the lock released and
//! re-check every condition when they wake, since other callers may have
//! taken slots in the meantime.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Scheduling parameters, taken from [`crate::MetConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_requests: usize,
    pub time_window: Duration,
    pub min_interval: Duration,
    /// Added on top of the oldest ticket's expiry when the window is full.
    pub window_margin: Duration,
}

/// Point-in-time view of the scheduler, for diagnostics and adaptive pausing.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// Requests recorded inside the current rolling window.
    pub requests_in_window: usize,
    /// Slots left before the window quota is exhausted.
    pub remaining: usize,
    /// Time since the most recent request, if any have been made.
    pub time_since_last: Option<Duration>,
    /// Whether a call could be dispatched right now without waiting.
    pub can_send_now: bool,
}

/// Sliding-window rate limiter for outbound API calls.
#[derive(Debug)]
pub struct RequestScheduler {
    config: SchedulerConfig,
    tickets: Mutex<VecDeque<Instant>>,
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let capacity = config.max_requests;
        Self {
            config,
            tickets: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Wait until it is safe to send, then record a ticket.
    ///
    /// Never fails. May suspend for the remainder of the min-interval gap,
    /// or until the oldest ticket exits the window when the quota is full.
    pub async fn acquire_slot(&self) {
        loop {
            let now = Instant::now();
            let mut tickets = self.tickets.lock().await;
            Self::prune(&mut tickets, now, self.config.time_window);

            // Enforce minimum spacing from the most recent request.
            if let Some(&last) = tickets.back() {
                let since_last = now.duration_since(last);
                if since_last < self.config.min_interval {
                    let wait = self.config.min_interval - since_last;
                    drop(tickets);
                    sleep(wait).await;
                    continue;
                }
            }

            // Window full: wait for the oldest ticket to age out, plus margin.
            if tickets.len() >= self.config.max_requests {
                if let Some(&oldest) = tickets.front() {
                    let expires_at = oldest + self.config.time_window + self.config.window_margin;
                    let wait = expires_at.duration_since(now);
                    debug!(
                        in_window = tickets.len(),
                        wait_ms = wait.as_millis() as u64,
                        "request window full, waiting for a slot"
                    );
                    drop(tickets);
                    sleep(wait).await;
                    continue;
                }
            }

            tickets.push_back(now);
            return;
        }
    }

    /// Snapshot the current window without mutating it.
    pub async fn status(&self) -> SchedulerStatus {
        let now = Instant::now();
        let tickets = self.tickets.lock().await;
        let requests_in_window = tickets
            .iter()
            .filter(|&&t| now.duration_since(t) < self.config.time_window)
            .count();
        let remaining = self.config.max_requests.saturating_sub(requests_in_window);
        let time_since_last = tickets.back().map(|&t| now.duration_since(t));
        let can_send_now = remaining > 0
            && time_since_last
                .map(|d| d >= self.config.min_interval)
                .unwrap_or(true);

        SchedulerStatus {
            requests_in_window,
            remaining,
            time_since_last,
            can_send_now,
        }
    }

    fn prune(tickets: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while tickets
            .front()
            .is_some_and(|&t| now.duration_since(t) >= window)
        {
            tickets.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            max_requests: 3,
            time_window: Duration::from_secs(2),
            min_interval: Duration::from_millis(100),
            window_margin: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spacing() {
        let scheduler = RequestScheduler::new(SchedulerConfig {
            max_requests: 100,
            ..test_config()
        });

        let mut stamps = Vec::new();
        for _ in 0..4 {
            scheduler.acquire_slot().await;
            stamps.push(Instant::now());
        }

        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_quota_enforced() {
        let scheduler = RequestScheduler::new(test_config());

        let start = Instant::now();
        for _ in 0..3 {
            scheduler.acquire_slot().await;
        }
        // Quota of 3 used; the fourth slot must wait for the window to roll.
        scheduler.acquire_slot().await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        let status = scheduler.status().await;
        assert!(status.requests_in_window <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_side_effect_free() {
        let scheduler = RequestScheduler::new(test_config());
        scheduler.acquire_slot().await;

        let before = scheduler.status().await;
        let after = scheduler.status().await;
        assert_eq!(before.requests_in_window, after.requests_in_window);
        assert_eq!(before.requests_in_window, 1);
        assert_eq!(before.remaining, 2);
        // Within min_interval of the last request.
        assert!(!before.can_send_now);

        tokio::time::advance(Duration::from_millis(150)).await;
        let later = scheduler.status().await;
        assert!(later.can_send_now);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_drains_over_time() {
        let scheduler = RequestScheduler::new(test_config());
        for _ in 0..3 {
            scheduler.acquire_slot().await;
        }
        tokio::time::advance(Duration::from_secs(3)).await;

        let status = scheduler.status().await;
        assert_eq!(status.requests_in_window, 0);
        assert_eq!(status.remaining, 3);
        assert!(status.can_send_now);
    }
}
