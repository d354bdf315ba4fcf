use serde::Deserialize;

/// Hard caps on the various bounded waits the core performs. Every cap here
/// escalates to an Error/timeout state rather than blocking indefinitely.
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Adapter cleanup cap, in seconds. Default 10.
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
    /// Connection manager shutdown cap, in seconds. Default 30.
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
    /// In-flight packet drain cap on shutdown, in seconds. Default 2.
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
    /// TLS handshake cap, in seconds. Default 15.
    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,
    /// Rate-limiter acquire wait cap, in seconds. Default 5.
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            cleanup_secs: default_cleanup_secs(),
            shutdown_secs: default_shutdown_secs(),
            drain_secs: default_drain_secs(),
            handshake_secs: default_handshake_secs(),
            rate_limit_wait_secs: default_rate_limit_wait_secs(),
        }
    }
}

fn default_cleanup_secs() -> u64 {
    10
}

fn default_shutdown_secs() -> u64 {
    30
}

fn default_drain_secs() -> u64 {
    2
}

fn default_handshake_secs() -> u64 {
    15
}

fn default_rate_limit_wait_secs() -> u64 {
    5
}
