use serde::Deserialize;
use std::net::SocketAddr;

/// Endpoint role. A server listens for inbound TLS sessions; a client dials
/// a single server and maintains a reconnecting session.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Server,
    Client,
}

/// Protocol filter applied to IP packets before they cross the tunnel.
/// A disabled class is dropped silently and counted in `dropped_filter`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolFilterConfig {
    #[serde(default = "default_true")]
    pub icmp: bool,
    #[serde(default = "default_true")]
    pub tcp: bool,
    #[serde(default = "default_true")]
    pub udp: bool,
}

impl Default for ProtocolFilterConfig {
    fn default() -> Self {
        Self { icmp: true, tcp: true, udp: true }
    }
}

fn default_true() -> bool {
    true
}

/// Virtual interface configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct InterfaceConfig {
    /// System-visible device name, e.g. "tun0".
    pub name: String,
    /// CIDR assigned to the local end of the tunnel, e.g. "10.0.0.1/24".
    pub cidr: String,
    /// Maximum transmission unit. Valid range 576..=9000.
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

fn default_mtu() -> u16 {
    1500
}

/// Role-specific endpoint configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    /// Address to bind to in server mode.
    pub listen: Option<SocketAddr>,
    /// Address to dial in client mode.
    pub server: Option<SocketAddr>,
}
