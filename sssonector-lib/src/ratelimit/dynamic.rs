use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Result, TunnelError};

use super::bucket::TokenBucket;

/// Wraps a [`TokenBucket`] with bounds and a cooldown gate on rate
/// adjustment (spec §3 "Dynamic Rate Controller", §4.4 "Dynamic
/// adjustment"). A policy engine outside this crate's scope decides *when*
/// to call [`DynamicLimiter::set_rate`] based on observed utilization; this
/// type only enforces the bounds, the cooldown, and the adjustment count.
pub struct DynamicLimiter {
    bucket: TokenBucket,
    min_rate: u64,
    max_rate: u64,
    cooldown: Duration,
    last_adjust: Mutex<Option<Instant>>,
    adjust_count: AtomicU64,
}

impl DynamicLimiter {
    pub fn new(base_rate: u64, min_rate: u64, max_rate: u64, cooldown: Duration) -> Self {
        let burst = TokenBucket::default_burst_for_rate(base_rate);
        Self {
            bucket: TokenBucket::new(base_rate.clamp(min_rate, max_rate), burst),
            min_rate,
            max_rate,
            cooldown,
            last_adjust: Mutex::new(None),
            adjust_count: AtomicU64::new(0),
        }
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    pub fn adjust_count(&self) -> u64 {
        self.adjust_count.load(Ordering::Relaxed)
    }

    /// Clamp `new_rate` to `[min_rate, max_rate]` and apply it, preserving
    /// accrued tokens (capped to the new capacity). Rejected with
    /// `CooldownActive` if called again before `cooldown` has elapsed since
    /// the last successful adjustment, and with `OutOfRange` if `new_rate`
    /// falls entirely outside the configured bounds -- clamping silently is
    /// NOT acceptable per spec §4.4, callers must know.
    pub fn set_rate(&self, new_rate: u64) -> Result<()> {
        if new_rate < self.min_rate || new_rate > self.max_rate {
            return Err(TunnelError::OutOfRange);
        }

        let mut last = self.last_adjust.lock().expect("dynamic limiter mutex poisoned");
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.cooldown {
                return Err(TunnelError::CooldownActive);
            }
        }

        let burst = TokenBucket::default_burst_for_rate(new_rate);
        self.bucket.set_rate_and_capacity(new_rate, burst);
        *last = Some(now);
        self.adjust_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_bounds() {
        let limiter = DynamicLimiter::new(1000, 500, 2000, Duration::from_millis(1));
        assert!(matches!(limiter.set_rate(100), Err(TunnelError::OutOfRange)));
        assert!(matches!(limiter.set_rate(5000), Err(TunnelError::OutOfRange)));
    }

    #[test]
    fn rejects_within_cooldown() {
        let limiter = DynamicLimiter::new(1000, 500, 2000, Duration::from_secs(60));
        limiter.set_rate(1500).unwrap();
        assert!(matches!(limiter.set_rate(1600), Err(TunnelError::CooldownActive)));
        assert_eq!(limiter.adjust_count(), 1);
    }

    #[test]
    fn succeeds_after_cooldown() {
        let limiter = DynamicLimiter::new(1000, 500, 2000, Duration::from_millis(5));
        limiter.set_rate(1500).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        limiter.set_rate(1600).unwrap();
        assert_eq!(limiter.adjust_count(), 2);
    }
}
