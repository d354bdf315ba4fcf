use serde::Deserialize;

use super::monitoring::{ObservabilityConfig, SnmpConfig};
use super::rate_limit::RateLimitConfig;
use super::telemetry::LoggingConfig;
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;
use super::tunnel::{EndpointConfig, InterfaceConfig, ProtocolFilterConfig, Role};

/// Adapter creation retry policy (§4.1 retry policy).
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            initial_backoff_ms: default_retry_initial_backoff_ms(),
        }
    }
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_initial_backoff_ms() -> u64 {
    100
}

/// Maximum concurrent client sessions accepted by the server.
fn default_max_clients() -> usize {
    64
}

/// Root configuration record. Immutable after startup; the process consumes
/// one of these already validated (parsing/env overlay/validation are
/// described in `loader`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub role: Role,
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    pub interface: InterfaceConfig,
    pub tls: TlsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub protocol_filter: ProtocolFilterConfig,
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Maximum concurrent client sessions (server mode only).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Directory holding CA/server/client certificate material, used by
    /// `-keygen`/`-validate-certs` and by the expiry watcher.
    #[serde(default = "default_cert_dir")]
    pub cert_dir: String,
    /// Ephemeral test mode: 15s-validity certificates and an expiry watcher
    /// that shuts the process down at the expiry boundary.
    #[serde(default)]
    pub test_without_certs: bool,
}

fn default_cert_dir() -> String {
    "./certs".to_string()
}
