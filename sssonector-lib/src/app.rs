//! Top-level orchestration: wires a loaded [`Config`] through certificate
//! material, the metrics/SNMP surface and the Connection Manager, and
//! implements the operator-facing one-shot operations (`-keygen`,
//! `-generate-certs-only`, `-validate-certs`, `-test-without-certs`) the CLI
//! exposes (spec §6 "CLI surface").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cert;
use crate::config::{Config, Role};
use crate::connmgr::{Client, Server};
use crate::error::Result;
use crate::telemetry::{self, Metrics, SnmpAgent};
use crate::transfer::ShutdownSignal;

/// Generate a fresh CA plus server and client leaf certificates under
/// `dir` (the `-keygen` operation).
pub fn keygen(dir: &Path) -> Result<()> {
    cert::generate_ca(dir)?;
    cert::generate_server(dir, &dir.join("ca.pem"))?;
    cert::generate_client(dir, &dir.join("ca.pem"))?;
    info!(?dir, "generated CA, server and client certificates");
    Ok(())
}

/// `-generate-certs-only`: identical material generation to `keygen`, kept
/// as a distinct CLI-facing name because it is meant to be run once during
/// provisioning and then never again, whereas `-keygen` may be re-run.
pub fn generate_certs_only(dir: &Path) -> Result<()> {
    keygen(dir)
}

/// `-validate-certs`: parse and verify the certificate chain in `dir`
/// without starting the tunnel.
pub fn validate_certs(dir: &Path) -> Result<cert::ValidationReport> {
    let report = cert::validate(dir)?;
    info!(
        ca = %report.ca_subject,
        server = %report.server_subject,
        client = %report.client_subject,
        "certificate chain valid"
    );
    Ok(report)
}

/// Resolve `cfg.tls` to point at the material in `cfg.cert_dir` for this
/// endpoint's role, generating ephemeral 15s-validity certificates first
/// when `test_without_certs` is set (spec §4.2 "test mode").
fn prepare_tls_material(cfg: &mut Config) -> Result<()> {
    let dir = PathBuf::from(&cfg.cert_dir);
    if cfg.test_without_certs {
        cert::generate_temporary(&dir)?;
        info!(?dir, "generated ephemeral test certificates (15s validity)");
    }
    let (cert_path, key_path, ca_path) = cert::material_paths(&dir, cfg.role);
    cfg.tls.cert_path = cert_path.to_string_lossy().into_owned();
    cfg.tls.key_path = key_path.to_string_lossy().into_owned();
    cfg.tls.ca_path = ca_path.to_string_lossy().into_owned();
    Ok(())
}

/// Run the tunnel to completion: bring up metrics/SNMP, run the
/// Connection Manager for `cfg.role`, and return once shutdown completes
/// or a fatal error occurs. `shutdown` is also driven by `run` itself when
/// SIGINT/SIGTERM is received, so callers that already have their own
/// signal handling may pass a `ShutdownSignal` that is triggered
/// externally instead.
pub async fn run(mut cfg: Config, shutdown: Arc<ShutdownSignal>) -> Result<()> {
    prepare_tls_material(&mut cfg)?;
    let cfg = Arc::new(cfg);

    let (metrics, registry) = telemetry::init_metrics().map_err(|e| crate::error::TunnelError::Metrics(e.to_string()))?;

    let mut background = Vec::new();

    if let Some(port) = cfg.observability.port {
        let registry = registry.clone();
        let metrics = metrics.clone();
        background.push(tokio::spawn(async move {
            if let Err(e) = telemetry::start_observability_server(port, registry, metrics).await {
                warn!(error = %e, "observability server exited");
            }
        }));
    }

    let snmp_cancel = CancellationToken::new();
    if cfg.snmp.enabled {
        if let Some(address) = cfg.snmp.address {
            let agent = SnmpAgent::new(address, cfg.snmp.community.clone(), cfg.role, metrics.clone());
            let cancel = snmp_cancel.clone();
            background.push(tokio::spawn(async move {
                agent.serve_forever(cancel).await;
            }));
        } else {
            warn!("snmp.enabled is true but no snmp.address was configured; agent not started");
        }
    }

    let expiry_watcher = cert::spawn_expiry_watcher(
        PathBuf::from(&cfg.cert_dir),
        cfg.test_without_certs,
        metrics.clone(),
        shutdown.clone(),
    );

    let ctrl_c_shutdown = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received interrupt, beginning graceful shutdown");
            ctrl_c_shutdown.trigger();
        }
    });

    let result = match cfg.role {
        Role::Server => Server::bind(cfg.clone(), metrics.clone(), shutdown.clone()).await?.serve().await,
        Role::Client => Client::new(cfg.clone(), metrics.clone(), shutdown.clone()).run().await,
    };

    shutdown.trigger();
    shutdown.mark_stopped();
    snmp_cancel.cancel();
    expiry_watcher.abort();
    signal_task.abort();
    for task in background {
        task.abort();
    }

    result
}
