//! Fixed-cadence request gate.
//!
//! Hands out one grant per period. Callers queue on a fair async mutex, so
//! concurrent senders are served in arrival order and the cadence holds no matter
//! how many are waiting.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

/// Ten grants per second.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    ticker: Mutex<Interval>,
}

impl RateLimiter {
    /// Create a limiter releasing ten grants per second.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_period(DEFAULT_PERIOD)
    }

    /// Create a limiter releasing one grant per `period`.
    ///
    /// The first grant becomes available one period after construction.
    pub fn with_period(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            period,
            ticker: Mutex::new(ticker),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next grant.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut ticker = self.ticker.lock().await;
        ticker.tick().await;
        let waited = started.elapsed();
        debug!(
            wait_ms = waited.as_millis() as u64,
            period_ms = self.period.as_millis() as u64,
            "rate limiter grant released"
        );
        waited
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
