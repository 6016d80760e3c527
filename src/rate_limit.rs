use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Default pacing for the aggregator and RPC endpoints (~1 req/sec).
pub const REQUEST_INTERVAL_MS: u64 = 1000;

/// Process-wide request gate.
///
/// Every outbound call to the aggregator and to the RPC node goes through
/// [`RateLimiter::acquire`]. The lock is held across the wait, so the
/// read-modify-write of the last start time cannot interleave and waiters
/// are released in call order (tokio's mutex is FIFO).
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_start: Mutex::new(None) }
    }

    /// Waits until at least `interval` has passed since the previous permitted
    /// call started, then records now as the new start. No timeout.
    pub async fn acquire(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            let wait = ready_at.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "rate_limit.wait");
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(REQUEST_INTERVAL_MS))
    }
}
