//! Rate limiter for Slack Web API calls.
//!
//! Spaces out `chat.postMessage` calls so bursts of kudos don't run into
//! Slack's per-channel posting limit, and honours `Retry-After` when Slack
//! answers with HTTP 429.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rate limiter that enforces minimum intervals between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Earliest time the next operation may start.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Waits until an operation is allowed, then marks the operation as performed.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;

        let wait_duration = next.map_or(Duration::ZERO, |at| {
            at.saturating_duration_since(Instant::now())
        });

        if !wait_duration.is_zero() {
            debug!(
                "Rate limiter: waiting {:?} before next operation",
                wait_duration
            );
            tokio::time::sleep(wait_duration).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait_duration
    }

    /// Checks if an operation is currently allowed without blocking.
    pub async fn is_allowed(&self) -> bool {
        let next = self.next_allowed.lock().await;
        next.is_none_or(|at| Instant::now() >= at)
    }

    /// Returns the time remaining until the next operation is allowed.
    pub async fn time_until_allowed(&self) -> Duration {
        let next = self.next_allowed.lock().await;
        next.map_or(Duration::ZERO, |at| {
            at.saturating_duration_since(Instant::now())
        })
    }

    /// Handles an HTTP 429 from Slack by pushing back the next allowed time.
    pub async fn handle_retry_after(&self, retry_after_secs: u64) {
        warn!(
            "Slack rate limited us, retry after {} seconds",
            retry_after_secs
        );
        let mut next = self.next_allowed.lock().await;
        let until = Instant::now() + Duration::from_secs(retry_after_secs);
        if next.is_none_or(|at| at < until) {
            *next = Some(until);
        }
    }

    /// Resets the rate limiter, allowing immediate operation.
    pub async fn reset(&self) {
        let mut next = self.next_allowed.lock().await;
        *next = None;
    }
}
