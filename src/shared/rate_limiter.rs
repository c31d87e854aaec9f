//! Keyed Rate Limiter
//!
//! In-process admission control shared by the HTTP middleware and the socket
//! read loop. One GCRA bucket per key (client address or identity), created
//! lazily with a full burst. State lives in governor's sharded keyed store,
//! so unrelated keys only contend when they hash to the same shard.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use tokio::task::JoinHandle;

/// Replenish interval used when the configured rate is zero.
const SLOWEST_PERIOD: Duration = Duration::from_secs(3600);

/// Per-key token bucket limiter. Parameters are fixed at construction.
pub struct RateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    period: Duration,
    burst: NonZeroU32,
}

impl RateLimiter {
    /// Create a limiter refilling `refill_per_sec` tokens per second up to `burst`.
    pub fn new(refill_per_sec: f64, burst: u32) -> Self {
        let period = if refill_per_sec > 0.0 {
            Duration::from_secs_f64(1.0 / refill_per_sec).min(SLOWEST_PERIOD)
        } else {
            SLOWEST_PERIOD
        };
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst);

        Self {
            limiter: DefaultKeyedRateLimiter::keyed(quota),
            period,
            burst,
        }
    }

    /// Consume a token for `key` if one is available. Never blocks.
    pub fn allow(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_owned()).is_ok()
    }

    /// Seconds a rejected caller should wait for the next token.
    pub fn retry_after_secs(&self) -> u64 {
        self.period.as_secs_f64().ceil().max(1.0) as u64
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst.get()
    }

    /// Drop keys whose bucket has refilled completely. Such a key decides
    /// exactly like a fresh one, so forgetting it changes nothing.
    pub fn evict_idle(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }

    /// Periodically evict idle keys until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.evict_idle();
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = limiter.tracked_keys(),
                        "Evicted idle rate limit keys"
                    );
                }
            }
        })
    }
}
