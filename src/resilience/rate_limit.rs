// src/resilience/rate_limit.rs
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Direct (unkeyed) limiter in front of the embedding provider.
pub struct RateLimit {
    limiter: DefaultDirectRateLimiter,
}

impl RateLimit {
    /// `per_second` sustained, bursts up to `burst`. Starts with the full burst available.
    pub fn new(per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Zero values are clamped to one.
    pub fn from_limits(per_second: u32, burst: u32) -> Self {
        Self::new(non_zero(per_second), non_zero(burst))
    }

    /// Take one cell if available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait up to `max_wait` for one cell.
    pub async fn acquire(&self, max_wait: Duration) -> bool {
        match tokio::time::timeout(max_wait, self.limiter.until_ready()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(target: "providers", ?max_wait, "rate limit: no capacity");
                false
            }
        }
    }
}

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_drains_then_blocks() {
        let rl = RateLimit::from_limits(1, 2);
        assert!(rl.try_acquire());
        assert!(rl.try_acquire());
        assert!(!rl.try_acquire());
    }

    #[tokio::test]
    async fn acquire_waits_for_replenishment() {
        let rl = RateLimit::from_limits(200, 1);
        assert!(rl.try_acquire());
        assert!(rl.acquire(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn acquire_gives_up_after_max_wait() {
        let rl = RateLimit::from_limits(1, 1);
        assert!(rl.try_acquire());
        assert!(!rl.acquire(Duration::from_millis(20)).await);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let rl = RateLimit::from_limits(0, 0);
        assert!(rl.try_acquire());
        assert!(!rl.try_acquire());
    }
}
