use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TunnelError};
use crate::iface::TunAdapter;
use crate::ratelimit::Limiters;
use crate::telemetry::Metrics;
use crate::tls::Listener;
use crate::transfer::{self, EngineConfig, ExitReason, ShutdownSignal};

use super::pool::AddressPool;

/// Server-side Connection Manager (spec §4.6 "Server operations"): accepts
/// TLS sessions, caps concurrency at `max_clients`, allocates each accepted
/// session a distinct address from the tunnel CIDR and its own Virtual
/// Interface, and spawns a Transfer Engine per session. Grounded on the
/// corpus's `proxy::connection::manager::ConnectionManager` (accept-time
/// capacity check, RAII-style release) and `tcp::handler::TcpHandler::run`
/// (`tokio::select!` accept loop raced against a shutdown signal).
pub struct Server {
    cfg: Arc<Config>,
    listener: Listener,
    pool: Arc<AddressPool>,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownSignal>,
    active_sessions: Arc<AtomicUsize>,
}

impl Server {
    pub async fn bind(cfg: Arc<Config>, metrics: Arc<Metrics>, shutdown: Arc<ShutdownSignal>) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .listen
            .ok_or_else(|| TunnelError::Config("server role requires a listen endpoint".into()))?;
        let listener = Listener::bind(endpoint, &cfg.tls).await?;
        let pool = Arc::new(AddressPool::new(&cfg.interface.cidr)?);
        info!(%endpoint, cidr = %cfg.interface.cidr, max_clients = cfg.max_clients, "connection manager listening");
        Ok(Self { cfg, listener, pool, metrics, shutdown, active_sessions: Arc::new(AtomicUsize::new(0)) })
    }

    /// Run the accept loop until shutdown, then wait for in-flight sessions
    /// to finish up to `timeouts.shutdown_secs` (spec §4.6 "On global
    /// shutdown").
    pub async fn serve(self) -> Result<()> {
        let mut sessions: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    info!("connection manager: shutdown requested, no longer accepting sessions");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((session, peer)) => self.accept_session(session, peer, &mut sessions),
                        Err(e) => warn!(error = %e, "failed to accept a tls session"),
                    }
                }
            }
        }

        let deadline = Duration::from_secs(self.cfg.timeouts.shutdown_secs);
        let drain = async {
            while sessions.join_next().await.is_some() {}
        };
        match timeout(deadline, drain).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(
                    remaining = sessions.len(),
                    "connection manager: shutdown deadline exceeded with sessions still active"
                );
                Err(TunnelError::ShutdownTimeout)
            }
        }
    }

    fn accept_session(&self, session: crate::tls::TlsSession, peer: std::net::SocketAddr, sessions: &mut JoinSet<()>) {
        if self.active_sessions.load(Ordering::Relaxed) >= self.cfg.max_clients {
            warn!(%peer, limit = self.cfg.max_clients, "max_clients reached, closing session");
            return;
        }

        let address = match self.pool.allocate() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(%peer, error = %e, "address pool exhausted, closing session");
                return;
            }
        };

        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.metrics.session_opened();
        info!(%peer, assigned = %address, "session accepted");

        let cfg = self.cfg.clone();
        let pool = self.pool.clone();
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();
        let active_sessions = self.active_sessions.clone();

        sessions.spawn(async move {
            run_session(cfg, session, address, pool.clone(), metrics.clone(), shutdown).await;
            pool.release(address);
            active_sessions.fetch_sub(1, Ordering::Relaxed);
            metrics.session_closed();
        });
    }
}

async fn run_session(
    cfg: Arc<Config>,
    session: crate::tls::TlsSession,
    address: std::net::Ipv4Addr,
    pool: Arc<AddressPool>,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownSignal>,
) {
    let session_id = session.id;
    let iface_cfg = crate::config::InterfaceConfig {
        name: String::new(),
        cidr: format!("{address}/{}", pool.prefix_len()),
        mtu: cfg.interface.mtu,
    };

    let adapter = match TunAdapter::create(&iface_cfg, &cfg.retry).await {
        Ok(a) => a,
        Err(e) => {
            warn!(session_id, %address, error = %e, "failed to bring up virtual interface for session");
            metrics.record_error();
            return;
        }
    };

    let limiters = Arc::new(Limiters::from_config(&cfg.rate_limit));
    limiters.publish_initial_metrics(&metrics);
    let engine_cfg = EngineConfig {
        mtu: cfg.interface.mtu as usize,
        protocol_filter: cfg.protocol_filter,
        timeouts: cfg.timeouts.clone(),
    };

    match transfer::run(Box::new(adapter), session, limiters, metrics.clone(), shutdown, engine_cfg).await {
        ExitReason::Shutdown => info!(session_id, "session ended: shutdown"),
        ExitReason::AdapterEof => info!(session_id, "session ended: virtual interface closed"),
        ExitReason::PeerClosed => info!(session_id, "session ended: peer closed"),
        ExitReason::Error(e) => {
            warn!(session_id, error = %e, "session ended with an error");
            metrics.record_error();
        }
    }
}
