use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, TunnelError};

use super::validator::validate_config;

/// Parse, apply environment overrides to, and validate a configuration file.
///
/// Environment variables recognized (each overrides the corresponding file
/// field; environment takes precedence over file, per the external
/// interfaces contract):
///
/// - `SSSONECTOR_ROLE`
/// - `SSSONECTOR_LISTEN` / `SSSONECTOR_SERVER`
/// - `SSSONECTOR_INTERFACE`
/// - `SSSONECTOR_CIDR`
/// - `SSSONECTOR_MTU`
/// - `SSSONECTOR_UPLOAD_BPS` / `SSSONECTOR_DOWNLOAD_BPS`
/// - `SSSONECTOR_CERT_DIR`
/// - `RUST_LOG` (consumed separately by tracing's own env filter)
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p.as_ref())
        .map_err(|e| TunnelError::Config(format!("failed to read config file: {e}")))?;
    let mut cfg: Config = toml::from_str(&txt)
        .map_err(|e| TunnelError::Config(format!("failed to parse config: {e}")))?;

    apply_env_overrides(&mut cfg)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) -> Result<()> {
    use std::env::var;

    if let Ok(v) = var("SSSONECTOR_ROLE") {
        cfg.role = match v.to_lowercase().as_str() {
            "server" => super::tunnel::Role::Server,
            "client" => super::tunnel::Role::Client,
            other => {
                return Err(TunnelError::Config(format!("invalid SSSONECTOR_ROLE: {other}")))
            }
        };
    }
    if let Ok(v) = var("SSSONECTOR_LISTEN") {
        cfg.endpoint.listen = Some(
            v.parse()
                .map_err(|e| TunnelError::Config(format!("invalid SSSONECTOR_LISTEN: {e}")))?,
        );
    }
    if let Ok(v) = var("SSSONECTOR_SERVER") {
        cfg.endpoint.server = Some(
            v.parse()
                .map_err(|e| TunnelError::Config(format!("invalid SSSONECTOR_SERVER: {e}")))?,
        );
    }
    if let Ok(v) = var("SSSONECTOR_INTERFACE") {
        cfg.interface.name = v;
    }
    if let Ok(v) = var("SSSONECTOR_CIDR") {
        cfg.interface.cidr = v;
    }
    if let Ok(v) = var("SSSONECTOR_MTU") {
        cfg.interface.mtu = v
            .parse()
            .map_err(|e| TunnelError::Config(format!("invalid SSSONECTOR_MTU: {e}")))?;
    }
    if let Ok(v) = var("SSSONECTOR_UPLOAD_BPS") {
        cfg.rate_limit.upload_bps = Some(
            v.parse()
                .map_err(|e| TunnelError::Config(format!("invalid SSSONECTOR_UPLOAD_BPS: {e}")))?,
        );
    }
    if let Ok(v) = var("SSSONECTOR_DOWNLOAD_BPS") {
        cfg.rate_limit.download_bps = Some(v.parse().map_err(|e| {
            TunnelError::Config(format!("invalid SSSONECTOR_DOWNLOAD_BPS: {e}"))
        })?);
    }
    if let Ok(v) = var("SSSONECTOR_CERT_DIR") {
        cfg.cert_dir = v;
    }

    Ok(())
}
