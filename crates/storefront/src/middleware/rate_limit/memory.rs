//! In-process limiter for development, tests, and deployments without Redis.
//!
//! Uses a `governor` keyed GCRA limiter with the same quota as the sliding
//! window: `limit` requests per window, all of which may be spent at once.
//! State is per process, so multiple replicas each enforce the quota.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use super::window::{RateLimitOutcome, SlidingWindow};

type KeyedLimiter =
    RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock, StateInformationMiddleware>;

/// Keys tracked before stale entries are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// Per-process keyed limiter for one endpoint class.
pub struct MemoryLimiter {
    limiter: KeyedLimiter,
    window: SlidingWindow,
    clock: DefaultClock,
}

impl std::fmt::Debug for MemoryLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLimiter")
            .field("window", &self.window)
            .field("tracked_keys", &self.limiter.len())
            .finish()
    }
}

impl MemoryLimiter {
    /// Build a limiter allowing `window.limit` requests per `window.window`.
    #[must_use]
    pub fn new(window: SlidingWindow) -> Self {
        let burst = NonZeroU32::new(window.limit).unwrap_or(NonZeroU32::MIN);
        let period = window.window / burst.get();
        let quota = Quota::with_period(period.max(Duration::from_millis(1)))
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            window,
            clock: DefaultClock::default(),
        }
    }

    /// Count a request for `ip` and decide whether it may proceed.
    pub fn check(&self, ip: IpAddr, now_ms: u64) -> RateLimitOutcome {
        if self.limiter.len() > SWEEP_THRESHOLD {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&ip) {
            Ok(snapshot) => RateLimitOutcome {
                success: true,
                limit: self.window.limit,
                remaining: snapshot.remaining_burst_capacity(),
                reset: self.window.reset_at(now_ms),
            },
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                #[allow(clippy::cast_possible_truncation)]
                let wait_ms = wait.as_millis() as u64;
                RateLimitOutcome {
                    success: false,
                    limit: self.window.limit,
                    remaining: 0,
                    reset: now_ms.saturating_add(wait_ms),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(198, 51, 100, last))
    }

    #[test]
    fn test_allows_limit_then_rejects() {
        let limiter = MemoryLimiter::new(SlidingWindow::new(3, Duration::from_secs(60)));
        let now = 1_000_000;

        let first = limiter.check(ip(1), now);
        assert!(first.success);
        assert_eq!(first.remaining, 2);
        assert!(limiter.check(ip(1), now).success);
        assert!(limiter.check(ip(1), now).success);

        let rejected = limiter.check(ip(1), now);
        assert!(!rejected.success);
        assert_eq!(rejected.remaining, 0);
        assert!(rejected.reset > now);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = MemoryLimiter::new(SlidingWindow::new(1, Duration::from_secs(60)));
        assert!(limiter.check(ip(1), 0).success);
        assert!(!limiter.check(ip(1), 0).success);
        assert!(limiter.check(ip(2), 0).success);
    }
}
