use serde::Deserialize;

/// TLS protocol version.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
}

/// Advanced TLS configuration: version bounds, cipher suites and curve
/// preferences. Mutual authentication is not configurable here; it is
/// mandatory for every tunnel session per the transport contract.
#[derive(Debug, Deserialize, Clone)]
pub struct TlsOptions {
    /// Minimum TLS version. Default: 1.2.
    #[serde(default = "default_min_version")]
    pub min_version: TlsVersion,
    /// Maximum TLS version. Default: 1.3.
    #[serde(default = "default_max_version")]
    pub max_version: TlsVersion,
    /// Allowed cipher suites (by name). Default: rustls's forward-secret,
    /// AEAD-only defaults.
    #[serde(default = "default_cipher_suites")]
    pub cipher_suites: Vec<String>,
    /// Elliptic curve preference order for ECDHE key exchange.
    #[serde(default = "default_curve_preferences")]
    pub curve_preferences: Vec<String>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            min_version: default_min_version(),
            max_version: default_max_version(),
            cipher_suites: default_cipher_suites(),
            curve_preferences: default_curve_preferences(),
        }
    }
}

fn default_min_version() -> TlsVersion {
    TlsVersion::V1_2
}

fn default_max_version() -> TlsVersion {
    TlsVersion::V1_3
}

impl TlsOptions {
    /// The `rustls` protocol versions allowed by `min_version..=max_version`,
    /// for `ClientConfig`/`ServerConfig::builder_with_protocol_versions`.
    pub fn rustls_protocol_versions(&self) -> Result<&'static [&'static rustls::SupportedProtocolVersion], String> {
        use rustls::version::{TLS12, TLS13};
        match (self.min_version, self.max_version) {
            (TlsVersion::V1_2, TlsVersion::V1_3) => Ok(&[&TLS13, &TLS12]),
            (TlsVersion::V1_2, TlsVersion::V1_2) => Ok(&[&TLS12]),
            (TlsVersion::V1_3, TlsVersion::V1_3) => Ok(&[&TLS13]),
            (TlsVersion::V1_3, TlsVersion::V1_2) => Err("min_version 1.3 exceeds max_version 1.2".into()),
        }
    }
}

use tokio_rustls::rustls;

fn default_cipher_suites() -> Vec<String> {
    crate::tls::cipher_suites::supported_cipher_suites()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_curve_preferences() -> Vec<String> {
    crate::tls::curves::supported_curves()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Session resumption configuration (TLS 1.2 session cache / TLS 1.3 tickets).
#[derive(Debug, Deserialize, Clone)]
pub struct SessionResumptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_session_cache_size")]
    pub max_sessions: usize,
}

impl Default for SessionResumptionConfig {
    fn default() -> Self {
        Self { enabled: true, max_sessions: default_session_cache_size() }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_cache_size() -> usize {
    256
}

/// TLS material and policy for one tunnel endpoint. Both client and server
/// present a certificate and verify the peer's against `ca_path`.
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// Path to this endpoint's certificate (PEM).
    pub cert_path: String,
    /// Path to this endpoint's private key (PEM).
    pub key_path: String,
    /// Path to the CA certificate used to verify the peer.
    pub ca_path: String,
    #[serde(default)]
    pub options: TlsOptions,
    #[serde(default)]
    pub session_resumption: SessionResumptionConfig,
}
