use serde::Deserialize;

/// Dynamic rate adjustment bounds for a `DynamicLimiter`.
#[derive(Debug, Deserialize, Clone)]
pub struct DynamicRateConfig {
    #[serde(default)]
    pub enabled: bool,
    pub min_bps: Option<u64>,
    pub max_bps: Option<u64>,
    /// Minimum interval between successive `set_rate` calls, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for DynamicRateConfig {
    fn default() -> Self {
        Self { enabled: false, min_bps: None, max_bps: None, cooldown_secs: default_cooldown_secs() }
    }
}

fn default_cooldown_secs() -> u64 {
    1
}

/// Per-direction token bucket configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Egress (upload) rate in bytes/sec. None disables shaping on that
    /// direction.
    pub upload_bps: Option<u64>,
    /// Ingress (download) rate in bytes/sec.
    pub download_bps: Option<u64>,
    /// Burst capacity in bytes, shared default is 10% of the configured
    /// rate (100ms worth of traffic) when unset.
    pub burst_bytes: Option<u64>,
    #[serde(default)]
    pub dynamic: DynamicRateConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { upload_bps: None, download_bps: None, burst_bytes: None, dynamic: DynamicRateConfig::default() }
    }
}
