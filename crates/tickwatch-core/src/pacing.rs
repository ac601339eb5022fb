use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Dispatch pacing for upstream fetches.
///
/// Wraps a shared rate budget (requests per window) and a jittered
/// inter-dispatch delay so a refresh cycle never fires its whole universe at
/// a provider in one burst.
#[derive(Clone)]
pub struct FetchPacer {
    limiter: Arc<DirectRateLimiter>,
    base_delay: Duration,
    jitter: Duration,
}

impl FetchPacer {
    pub fn new(quota_window: Duration, quota_limit: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
            base_delay,
            jitter,
        }
    }

    /// Pacing suitable for anonymous public market-data endpoints:
    /// 120 requests/minute with ~500ms spacing between dispatches.
    pub fn default_market_data() -> Self {
        Self::new(
            Duration::from_secs(60),
            120,
            Duration::from_millis(500),
            Duration::from_millis(250),
        )
    }

    /// True when the rate budget has room for one more request.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Delay to apply before the next dispatch on the same worker.
    pub fn dispatch_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        self.base_delay + Duration::from_millis(fastrand::u64(0..=jitter_ms))
    }

    /// Wait for rate budget, sleeping the jittered delay between probes.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(self.dispatch_delay()).await;
        }
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
