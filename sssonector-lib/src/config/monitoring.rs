use serde::Deserialize;
use std::net::SocketAddr;

/// SNMPv2c agent configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SnmpConfig {
    #[serde(default)]
    pub enabled: bool,
    /// UDP address to bind the agent to.
    pub address: Option<SocketAddr>,
    #[serde(default = "default_community")]
    pub community: String,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self { enabled: false, address: None, community: default_community() }
    }
}

fn default_community() -> String {
    "public".to_string()
}

/// Prometheus/HTTP observability surface configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ObservabilityConfig {
    /// Port for the `/metrics`, `/health`, `/ready`, `/live` HTTP server.
    /// None disables the server.
    #[serde(default)]
    pub port: Option<u16>,
}
