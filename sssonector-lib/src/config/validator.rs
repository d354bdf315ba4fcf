use crate::error::{Result, TunnelError};

use super::root::Config;
use super::tunnel::Role;

pub fn validate_config(cfg: &Config) -> Result<()> {
    match cfg.role {
        Role::Server if cfg.endpoint.listen.is_none() => {
            return Err(TunnelError::Config("server role requires `listen`".into()));
        }
        Role::Client if cfg.endpoint.server.is_none() => {
            return Err(TunnelError::Config("client role requires `server`".into()));
        }
        _ => {}
    }

    if !(576..=9000).contains(&cfg.interface.mtu) {
        return Err(TunnelError::Config(format!(
            "mtu {} outside valid range 576..=9000",
            cfg.interface.mtu
        )));
    }

    if cfg.interface.cidr.parse::<ipnet::IpNet>().is_err() {
        return Err(TunnelError::Config(format!(
            "invalid interface cidr: {}",
            cfg.interface.cidr
        )));
    }

    if let Some(burst) = cfg.rate_limit.burst_bytes {
        if let Some(rate) = cfg.rate_limit.upload_bps.or(cfg.rate_limit.download_bps) {
            if burst as f64 > rate as f64 {
                // A burst above 1s worth of traffic is the documented ceiling;
                // larger values are accepted but produce unacceptable jitter,
                // so reject outright rather than clamp silently.
                return Err(TunnelError::Config(
                    "burst_bytes must not exceed 1 second of the configured rate".into(),
                ));
            }
        }
    }

    if cfg.tls.options.rustls_protocol_versions().is_err() {
        return Err(TunnelError::Config(
            "tls.options.min_version must not exceed max_version".into(),
        ));
    }

    if cfg.rate_limit.dynamic.enabled {
        let (min, max) = (cfg.rate_limit.dynamic.min_bps, cfg.rate_limit.dynamic.max_bps);
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(TunnelError::Config(
                    "rate_limit.dynamic.min_bps must be <= max_bps".into(),
                ));
            }
        }
    }

    Ok(())
}
