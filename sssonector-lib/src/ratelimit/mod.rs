//! Token-Bucket Rate Limiter (spec §4.4): per-direction shaping with
//! TCP-overhead compensation and an optional dynamic rate controller.

mod bucket;
mod dynamic;

pub use bucket::{TokenBucket, DEFAULT_BURST_FRACTION, MAX_BURST_FRACTION, TCP_OVERHEAD_FACTOR};
pub use dynamic::DynamicLimiter;

use std::time::Duration;

use crate::config::RateLimitConfig;

/// Either a fixed-rate bucket or a dynamically-adjustable one. The Transfer
/// Engine only ever needs the underlying [`TokenBucket`] to acquire tokens;
/// the dynamic controller is a separate handle used by whatever adjusts the
/// rate at runtime (spec §4.4 "Dynamic adjustment").
pub enum Limiter {
    Static(TokenBucket),
    Dynamic(DynamicLimiter),
}

impl Limiter {
    pub fn bucket(&self) -> &TokenBucket {
        match self {
            Limiter::Static(b) => b,
            Limiter::Dynamic(d) => d.bucket(),
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicLimiter> {
        match self {
            Limiter::Static(_) => None,
            Limiter::Dynamic(d) => Some(d),
        }
    }
}

/// One egress + one ingress limiter, built from a tunnel's configured rate
/// limits (spec §3 "two per tunnel -- ingress and egress").
pub struct Limiters {
    pub egress: Limiter,
    pub ingress: Limiter,
}

impl Limiters {
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        if cfg.dynamic.enabled {
            let cooldown = Duration::from_secs(cfg.dynamic.cooldown_secs);
            let up_base = cfg.upload_bps.unwrap_or(u64::MAX);
            let down_base = cfg.download_bps.unwrap_or(u64::MAX);
            let min = cfg.dynamic.min_bps.unwrap_or(up_base.min(down_base));
            let max = cfg.dynamic.max_bps.unwrap_or(up_base.max(down_base));

            return Self {
                egress: Limiter::Dynamic(DynamicLimiter::new(apply_overhead(up_base), min, max, cooldown)),
                ingress: Limiter::Dynamic(DynamicLimiter::new(apply_overhead(down_base), min, max, cooldown)),
            };
        }

        let up = cfg.upload_bps.map(apply_overhead).unwrap_or(0);
        let down = cfg.download_bps.map(apply_overhead).unwrap_or(0);
        let burst = cfg.burst_bytes.unwrap_or_else(|| TokenBucket::default_burst_for_rate(up.max(down)));

        Self {
            egress: Limiter::Static(TokenBucket::new(up, if up == 0 { 0 } else { burst })),
            ingress: Limiter::Static(TokenBucket::new(down, if down == 0 { 0 } else { burst })),
        }
    }

    /// Publish the as-configured rate/burst for this session into the
    /// metrics surface so the SNMP `.3` RateLimit subtree (spec §4.7)
    /// reflects something other than zero before the first dynamic
    /// adjustment.
    pub fn publish_initial_metrics(&self, metrics: &crate::telemetry::Metrics) {
        let egress = self.egress.bucket();
        let ingress = self.ingress.bucket();
        metrics.set_rates(ingress.rate_bps(), egress.rate_bps(), TCP_OVERHEAD_FACTOR);
        metrics.set_burst_limit(egress.burst_capacity().max(ingress.burst_capacity()));
    }
}

/// Apply the TCP overhead compensation factor to a configured user-payload
/// rate, rounding down.
fn apply_overhead(rate_bps: u64) -> u64 {
    ((rate_bps as f64) * TCP_OVERHEAD_FACTOR) as u64
}
