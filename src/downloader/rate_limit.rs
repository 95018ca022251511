//! Sliding-window request rate limiting
//!
//! Each permitted request holds one of `max_requests` slots for `window`
//! after it passes. Any interval of length `window` therefore contains at most
//! `max_requests` passages across all callers combined.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::warn;

use crate::metrics::RateLimiterMetrics;

/// Request-rate ceiling shared by every worker
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a request-based rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window (at least 1)
    /// * `window` - Time window for rate limit
    pub fn request_based(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            window,
        }
    }

    /// Create a limiter allowing `requests_per_second` requests in any one-second window
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::request_based(requests_per_second as usize, Duration::from_secs(1))
    }

    /// Configured ceiling per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Configured window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Slots free right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait until one more request may pass
    ///
    /// Never fails; it only delays. The slot is held for one window after the
    /// call returns and then released in the background.
    pub async fn acquire(&self) {
        let mut metrics = RateLimiterMetrics::new();
        metrics.start_acquire();

        match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => {
                let window = self.window;
                tokio::spawn(async move {
                    sleep(window).await;
                    drop(permit);
                });
            }
            // Only reachable if the semaphore is closed, which this type never does.
            Err(e) => warn!(error = %e, "Rate limiter semaphore closed; passing request through"),
        }

        metrics.record_acquired();
        metrics.update_available_permits(self.available());
    }
}
