//! Minimum-interval rate limiter for query API requests

use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::time::Duration;

type Limiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Enforces a minimum spacing between outbound requests.
///
/// One instance is shared (behind an `Arc`) by every fetch path of a run, so
/// the spacing holds process-wide no matter how many jobs are active. The
/// quota allows a burst of one, so no two permits are closer than
/// [`min_interval`](Self::min_interval).
///
/// # Example
/// ```no_run
/// use nautobot_hec_exporter::client::RateLimiter;
///
/// # async fn example() {
/// let limiter = RateLimiter::new(10.0);
/// limiter.wait().await; // first call passes immediately
/// limiter.wait().await; // waits ~100ms
/// # }
/// ```
pub struct RateLimiter {
    min_interval: Duration,
    limiter: Limiter,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter allowing at most `max_rps` requests per second.
    ///
    /// Values that are zero, negative or not finite fall back to 1 rps.
    pub fn new(max_rps: f64) -> Self {
        let max_rps = if max_rps.is_finite() && max_rps > 0.0 {
            max_rps
        } else {
            1.0
        };
        // Sub-nanosecond periods round to zero, which Quota rejects
        let min_interval = Duration::from_secs_f64(1.0 / max_rps).max(Duration::from_nanos(1));
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        Self {
            min_interval,
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// Interval enforced between two permitted calls
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request is permitted.
    pub async fn wait(&self) {
        if self.limiter.check().is_err() {
            log::trace!("Rate limiter pausing, interval {:?}", self.min_interval);
            self.limiter.until_ready().await;
        }
    }
}
