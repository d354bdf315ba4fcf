use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use x509_parser::prelude::*;

use super::authority::cert_paths;
use super::PRODUCTION_WARNING_WINDOW_DAYS;
use crate::telemetry::Metrics;
use crate::transfer::ShutdownSignal;

pub struct ExpiryWatcherHandle {
    task: JoinHandle<()>,
}

impl ExpiryWatcherHandle {
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Background activity (spec §4.2 "Expiry watcher"): wakes periodically and,
/// on detecting expiry within the warning window, emits a warning metric.
/// In ephemeral mode it instead triggers process-wide shutdown at the
/// expiry boundary -- the defining behavior of test mode.
pub fn spawn_expiry_watcher(
    cert_dir: PathBuf,
    ephemeral: bool,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownSignal>,
) -> ExpiryWatcherHandle {
    let period = if ephemeral { Duration::from_secs(15) } else { Duration::from_secs(3600) };

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match earliest_expiry(&cert_dir) {
                Ok(not_after) => {
                    let now = ASN1Time::from(std::time::SystemTime::now());
                    if now >= not_after {
                        if ephemeral {
                            info!("ephemeral certificates expired, triggering shutdown");
                            shutdown.trigger();
                            return;
                        } else {
                            warn!("certificate has expired");
                            metrics.record_cert_expiry_warning();
                        }
                    } else if !ephemeral {
                        let seconds_left = (not_after.timestamp()
                            - ASN1Time::from(std::time::SystemTime::now()).timestamp())
                        .max(0);
                        if seconds_left < PRODUCTION_WARNING_WINDOW_DAYS * 86_400 {
                            warn!(seconds_left, "certificate approaching expiry");
                            metrics.record_cert_expiry_warning();
                        }
                    }
                }
                Err(e) => warn!(error = %e, "expiry watcher failed to read certificates"),
            }
        }
    });

    ExpiryWatcherHandle { task }
}

fn earliest_expiry(dir: &std::path::Path) -> crate::error::Result<ASN1Time> {
    let (ca_path, server_path, client_path) = cert_paths(dir);
    let mut earliest: Option<ASN1Time> = None;
    for path in [ca_path, server_path, client_path] {
        let bytes = std::fs::read(&path)
            .map_err(|e| crate::error::TunnelError::Certificate(format!("read {path:?}: {e}")))?;
        let (_, pem) = parse_x509_pem(&bytes)
            .map_err(|e| crate::error::TunnelError::Certificate(format!("parse {path:?}: {e}")))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| crate::error::TunnelError::Certificate(format!("parse {path:?}: {e}")))?;
        let not_after = cert.validity().not_after;
        earliest = Some(match earliest {
            Some(e) if e < not_after => e,
            _ => not_after,
        });
    }
    earliest.ok_or_else(|| crate::error::TunnelError::Certificate("no certificates found".into()))
}
