use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TunnelError};
use crate::iface::TunAdapter;
use crate::ratelimit::Limiters;
use crate::telemetry::Metrics;
use crate::tls::dial;
use crate::transfer::{self, EngineConfig, ExitReason, ShutdownSignal};

/// Client-side Connection Manager (spec §4.6 "Client operations"):
/// maintains exactly one Transfer Session against the configured server,
/// reconnecting whenever it ends for a reason other than shutdown.
/// `tls::dial` already retries transient connection failures with
/// exponential backoff, so reconnecting here is simply looping back to it.
pub struct Client {
    cfg: Arc<Config>,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownSignal>,
}

impl Client {
    pub fn new(cfg: Arc<Config>, metrics: Arc<Metrics>, shutdown: Arc<ShutdownSignal>) -> Self {
        Self { cfg, metrics, shutdown }
    }

    pub async fn run(self) -> Result<()> {
        let endpoint = self
            .cfg
            .endpoint
            .server
            .ok_or_else(|| TunnelError::Config("client role requires a server endpoint".into()))?;
        let sni = endpoint.ip().to_string();

        let cancel = CancellationToken::new();
        let propagate = {
            let shutdown = self.shutdown.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                shutdown.wait().await;
                cancel.cancel();
            })
        };

        let result = self.run_until_shutdown(endpoint, &sni, &cancel).await;
        propagate.abort();
        result
    }

    async fn run_until_shutdown(&self, endpoint: std::net::SocketAddr, sni: &str, cancel: &CancellationToken) -> Result<()> {
        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }

            // `dial` retries both connection and handshake failures
            // internally with backoff (spec §4.3 "Failure semantics") and
            // returns `Err` only when `cancel` fires, which in turn only
            // happens once `shutdown` has been triggered.
            let session = match dial(endpoint, &self.cfg.tls, sni, cancel).await {
                Ok(session) => session,
                Err(_) => return Ok(()),
            };

            info!(session_id = session.id, %endpoint, "tunnel session established");
            self.metrics.session_opened();

            let adapter = TunAdapter::create(&self.cfg.interface, &self.cfg.retry).await?;
            let limiters = Arc::new(Limiters::from_config(&self.cfg.rate_limit));
            limiters.publish_initial_metrics(&self.metrics);
            let engine_cfg = EngineConfig {
                mtu: self.cfg.interface.mtu as usize,
                protocol_filter: self.cfg.protocol_filter,
                timeouts: self.cfg.timeouts.clone(),
            };

            let exit = transfer::run(
                Box::new(adapter),
                session,
                limiters,
                self.metrics.clone(),
                self.shutdown.clone(),
                engine_cfg,
            )
            .await;
            self.metrics.session_closed();

            match exit {
                ExitReason::Shutdown => return Ok(()),
                ExitReason::AdapterEof | ExitReason::PeerClosed => {
                    if self.shutdown.is_triggered() {
                        return Ok(());
                    }
                    warn!("tunnel session ended, reconnecting");
                }
                ExitReason::Error(e) => {
                    if self.shutdown.is_triggered() {
                        return Ok(());
                    }
                    self.metrics.record_error();
                    warn!(error = %e, "tunnel session ended with an error, reconnecting");
                }
            }
        }
    }
}
