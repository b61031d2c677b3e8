//! Sliding-window arithmetic.
//!
//! Two fixed windows are kept per key. The request count attributed to the
//! sliding window is the current window's count plus the previous window's
//! count weighted by how much of the previous window the sliding window
//! still overlaps.

use std::time::Duration;

/// Limit and window length for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    pub limit: u32,
    pub window: Duration,
}

/// Result of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix time in milliseconds at which the current fixed window ends.
    pub reset: u64,
}

impl RateLimitOutcome {
    /// Outcome reported when the backend is unavailable.
    #[must_use]
    pub const fn fail_open(limit: u32, reset: u64) -> Self {
        Self {
            success: true,
            limit,
            remaining: limit,
            reset,
        }
    }

    /// Whole seconds until `reset`, at least one.
    #[must_use]
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset.saturating_sub(now_ms).div_ceil(1000).max(1)
    }
}

impl SlidingWindow {
    #[must_use]
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn window_ms(&self) -> u64 {
        (self.window.as_millis() as u64).max(1)
    }

    /// Index of the fixed window containing `now_ms`.
    #[must_use]
    pub fn index(&self, now_ms: u64) -> u64 {
        now_ms / self.window_ms()
    }

    /// End of the fixed window containing `now_ms`.
    #[must_use]
    pub fn reset_at(&self, now_ms: u64) -> u64 {
        (self.index(now_ms) + 1) * self.window_ms()
    }

    /// Expiry for a window counter: long enough to serve as the previous
    /// window for the whole of the next one.
    #[must_use]
    pub fn counter_ttl_ms(&self) -> u64 {
        self.window_ms() * 2 + 1000
    }

    /// Requests attributed to the sliding window ending at `now_ms`.
    ///
    /// `previous` and `current` are the fixed-window counts; `current`
    /// already includes the request being checked.
    #[must_use]
    pub fn weighted_count(&self, previous: u64, current: u64, now_ms: u64) -> u64 {
        let window = self.window_ms();
        let elapsed = now_ms % window;
        // floor(previous * (window - elapsed) / window), in integers
        let carried = u128::from(previous) * u128::from(window - elapsed) / u128::from(window);
        u64::try_from(carried).unwrap_or(u64::MAX).saturating_add(current)
    }

    /// Decide a request given both fixed-window counts.
    #[must_use]
    pub fn evaluate(&self, previous: u64, current: u64, now_ms: u64) -> RateLimitOutcome {
        let used = self.weighted_count(previous, current, now_ms);
        let limit = u64::from(self.limit);
        RateLimitOutcome {
            success: used <= limit,
            limit: self.limit,
            remaining: u32::try_from(limit.saturating_sub(used)).unwrap_or(0),
            reset: self.reset_at(now_ms),
        }
    }
}
