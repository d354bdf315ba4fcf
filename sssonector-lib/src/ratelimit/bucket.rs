use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{Result, TunnelError};

/// Factor applied to a configured user-payload rate to compensate for TCP,
/// IP and TLS framing overhead over the tunnel's carrier connection (spec
/// §4.4 "TCP overhead compensation"). Exposed via the `rate_overhead_factor`
/// metric.
pub const TCP_OVERHEAD_FACTOR: f64 = 1.10;

/// Fraction of the sustained rate used as the default burst capacity: 100ms
/// worth of traffic (spec §4.4 "Burst sizing"). An implementer MUST NOT ship
/// a larger default; this replaces the historical 1-second default that
/// produced unacceptable jitter.
pub const DEFAULT_BURST_FRACTION: f64 = 0.1;

/// Hard ceiling on the configurable burst capacity: at most 1 second worth
/// of the configured rate.
pub const MAX_BURST_FRACTION: f64 = 1.0;

struct BucketState {
    current_tokens: f64,
    last_update: Instant,
}

/// A token bucket shaping one direction of tunnel traffic (spec §3 "Token
/// Bucket", §4.4). Thread-safe; every mutation is a short critical section
/// under `state`. `rate_bps` and a running `rate_limit_hits` counter are
/// additionally mirrored as atomics so the metrics/SNMP surface can read
/// them without taking the bucket's lock (spec §4.4 "Concurrency").
pub struct TokenBucket {
    state: Mutex<BucketState>,
    rate_bps: AtomicU64,
    burst_capacity: AtomicU64,
    rate_limit_hits: AtomicU64,
}

impl TokenBucket {
    /// `rate_bps` is the *effective* bucket rate (already including any TCP
    /// overhead compensation the caller wants applied); `burst_capacity` is
    /// in bytes. Starting token count is 0, not capacity, so a freshly
    /// started tunnel cannot burst above the configured capacity.
    pub fn new(rate_bps: u64, burst_capacity: u64) -> Self {
        Self {
            state: Mutex::new(BucketState { current_tokens: 0.0, last_update: Instant::now() }),
            rate_bps: AtomicU64::new(rate_bps),
            burst_capacity: AtomicU64::new(burst_capacity),
            rate_limit_hits: AtomicU64::new(0),
        }
    }

    /// Default burst capacity for a given rate: 10% of one second's worth
    /// of traffic, i.e. 100ms.
    pub fn default_burst_for_rate(rate_bps: u64) -> u64 {
        ((rate_bps as f64) * DEFAULT_BURST_FRACTION) as u64
    }

    pub fn rate_bps(&self) -> u64 {
        self.rate_bps.load(Ordering::Relaxed)
    }

    pub fn burst_capacity(&self) -> u64 {
        self.burst_capacity.load(Ordering::Relaxed)
    }

    pub fn rate_limit_hits(&self) -> u64 {
        self.rate_limit_hits.load(Ordering::Relaxed)
    }

    fn refill_locked(&self, state: &mut BucketState, now: Instant) {
        let rate = self.rate_bps.load(Ordering::Relaxed) as f64;
        let capacity = self.burst_capacity.load(Ordering::Relaxed) as f64;
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.current_tokens = (state.current_tokens + elapsed * rate).min(capacity);
        state.last_update = now;
    }

    /// Acquire `n` tokens, waiting cooperatively for them to accrue if
    /// necessary. Returns `RateLimitTimeout` if the wait would exceed
    /// `wait_cap` (spec §4.4 "Wait behavior"; default cap 5s per
    /// `TimeoutConfig::rate_limit_wait_secs`).
    ///
    /// A wait of *exactly* `wait_cap` succeeds; any amount over fails. The
    /// caller is expected to retry rate-limiter timeouts rather than treat
    /// them as tunnel-fatal (spec §4.5 "Failure semantics").
    pub async fn acquire(&self, n: u64, wait_cap: Duration) -> Result<()> {
        let deadline = Instant::now() + wait_cap;
        loop {
            let wait = {
                let mut state = self.state.lock().expect("token bucket mutex poisoned");
                let now = Instant::now();
                self.refill_locked(&mut state, now);
                if state.current_tokens >= n as f64 {
                    state.current_tokens -= n as f64;
                    return Ok(());
                }
                let rate = self.rate_bps.load(Ordering::Relaxed) as f64;
                if rate <= 0.0 {
                    // Unshaped direction: never block.
                    state.current_tokens = 0.0;
                    return Ok(());
                }
                let deficit = n as f64 - state.current_tokens;
                Duration::from_secs_f64(deficit / rate)
            };

            let now = Instant::now();
            if now >= deadline {
                self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                return Err(TunnelError::RateLimitTimeout);
            }
            let remaining = deadline - now;
            let sleep_for = wait.min(remaining);
            tokio::time::sleep(sleep_for).await;
            if sleep_for < wait && Instant::now() >= deadline {
                self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                return Err(TunnelError::RateLimitTimeout);
            }
        }
    }

    /// Replace the bucket's rate, clamping accrued tokens to the (possibly
    /// new) capacity. Used by [`super::dynamic::DynamicLimiter::set_rate`];
    /// not cooldown-gated on its own.
    pub(super) fn set_rate_and_capacity(&self, rate_bps: u64, burst_capacity: u64) {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        self.refill_locked(&mut state, Instant::now());
        self.rate_bps.store(rate_bps, Ordering::Relaxed);
        self.burst_capacity.store(burst_capacity, Ordering::Relaxed);
        if state.current_tokens > burst_capacity as f64 {
            warn!(
                current_tokens = state.current_tokens,
                new_capacity = burst_capacity,
                "clamping accrued tokens to new bucket capacity"
            );
            state.current_tokens = burst_capacity as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_and_accrues() {
        let bucket = TokenBucket::new(1000, 1000);
        // No tokens yet: a 1-byte acquire must wait, not succeed immediately.
        let err = bucket.acquire(1000, Duration::from_millis(1)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn acquire_succeeds_once_accrued() {
        let bucket = TokenBucket::new(1_000_000, 1_000_000);
        tokio::time::sleep(Duration::from_millis(50)).await;
        bucket.acquire(1000, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn unshaped_bucket_never_blocks() {
        let bucket = TokenBucket::new(0, 0);
        bucket.acquire(1_000_000, Duration::from_millis(1)).await.unwrap();
    }

    #[test]
    fn default_burst_is_100ms_worth() {
        assert_eq!(TokenBucket::default_burst_for_rate(10_000_000), 1_000_000);
    }
}
