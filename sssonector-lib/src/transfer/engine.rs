use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsStream;
use tracing::{info, warn};

use crate::config::{ProtocolFilterConfig, TimeoutConfig};
use crate::error::{Result, TunnelError};
use crate::iface::VirtualInterfaceAdapter;
use crate::ratelimit::Limiters;
use crate::telemetry::Metrics;
use crate::tls::{framing, TlsSession};

use super::filter::is_allowed;
use super::shutdown::ShutdownSignal;

/// Extra headroom above the configured MTU the receiver tolerates on an
/// inbound frame (spec §4.3 "adapter MTU plus a small tolerance", §6 "max
/// length is the smaller of 65535 and MTU + 64").
const FRAME_TOLERANCE: usize = 64;

/// Why a Transfer Engine run ended, surfaced to the Connection Manager as
/// the tunnel's exit reason (spec §4.5 "Failure semantics", §7 "Propagation
/// policy").
#[derive(Debug)]
pub enum ExitReason {
    /// The shutdown signal fired and both directions drained cleanly.
    Shutdown,
    /// The local adapter reported EOF (interface brought down).
    AdapterEof,
    /// The peer closed the TLS session.
    PeerClosed,
    /// An unrecoverable error in either direction.
    Error(TunnelError),
}

enum DirectionExit {
    Shutdown,
    Eof,
    Error(TunnelError),
}

/// Fixed knobs for one Transfer Engine run, carried from [`crate::config::Config`].
pub struct EngineConfig {
    pub mtu: usize,
    pub protocol_filter: ProtocolFilterConfig,
    pub timeouts: TimeoutConfig,
}

/// Runs one Transfer Session to completion: two concurrent tasks shuttling
/// packets between `adapter` and `session` until either direction ends or
/// `shutdown` fires (spec §4.5, §3 "Transfer Session").
///
/// Consumes both the adapter and the TLS session -- a Transfer Engine owns
/// them exclusively for its lifetime (spec §5 "Shared resources").
pub async fn run(
    adapter: Box<dyn VirtualInterfaceAdapter>,
    session: TlsSession,
    limiters: Arc<Limiters>,
    metrics: Arc<Metrics>,
    shutdown: Arc<ShutdownSignal>,
    cfg: EngineConfig,
) -> ExitReason {
    let session_id = session.id;
    let (tls_read, tls_write) = session.split();
    let (adapter_read, adapter_write, adapter_cleanup) = adapter.split();

    let max_inbound_frame = (cfg.mtu + FRAME_TOLERANCE).min(framing::MAX_FRAME_LEN);
    let rate_wait_cap = Duration::from_secs(cfg.timeouts.rate_limit_wait_secs);
    let drain_cap = Duration::from_secs(cfg.timeouts.drain_secs);
    let cleanup_cap = Duration::from_secs(cfg.timeouts.cleanup_secs);

    let outbound = {
        let shutdown = shutdown.clone();
        let metrics = metrics.clone();
        let limiters = limiters.clone();
        let filter = cfg.protocol_filter;
        let mtu = cfg.mtu;
        tokio::spawn(async move {
            outbound_loop(adapter_read, tls_write, &limiters, &metrics, &shutdown, filter, mtu, rate_wait_cap, drain_cap)
                .await
        })
    };

    let inbound = {
        let shutdown = shutdown.clone();
        let metrics = metrics.clone();
        let limiters = limiters.clone();
        let filter = cfg.protocol_filter;
        tokio::spawn(async move {
            inbound_loop(tls_read, adapter_write, &limiters, &metrics, &shutdown, filter, max_inbound_frame, rate_wait_cap)
                .await
        })
    };

    // Either direction ending is itself a reason to trigger shutdown for the
    // other: EOF on the adapter or the peer closing is not a bug, but the
    // tunnel has nothing left to do (spec §4.5 "EOF semantics").
    let (outbound_exit, inbound_exit) = tokio::join!(outbound, inbound);
    shutdown.trigger();

    let outbound_exit = outbound_exit.unwrap_or_else(|e| DirectionExit::Error(join_error(e)));
    let inbound_exit = inbound_exit.unwrap_or_else(|e| DirectionExit::Error(join_error(e)));

    // Both halves are dropped now that their owning tasks have returned;
    // `finish` just needs to drive the state machine's final transition.
    if let Err(e) = adapter_cleanup.finish(cleanup_cap, async {}).await {
        warn!(session_id, error = %e, "adapter cleanup after transfer engine exit failed");
    }

    classify_exit(outbound_exit, inbound_exit)
}

fn join_error(e: tokio::task::JoinError) -> TunnelError {
    TunnelError::Protocol(format!("transfer engine task panicked: {e}"))
}

fn classify_exit(outbound: DirectionExit, inbound: DirectionExit) -> ExitReason {
    match (outbound, inbound) {
        (DirectionExit::Error(e), _) | (_, DirectionExit::Error(e)) => ExitReason::Error(e),
        (DirectionExit::Eof, _) => ExitReason::AdapterEof,
        (_, DirectionExit::Eof) => ExitReason::PeerClosed,
        (DirectionExit::Shutdown, DirectionExit::Shutdown) => ExitReason::Shutdown,
    }
}

/// Outbound: adapter -> TLS. Reads one IP packet from the local interface,
/// applies the protocol filter, acquires egress tokens, then frames and
/// writes it to the peer (spec §4.5 "Outbound").
#[allow(clippy::too_many_arguments)]
async fn outbound_loop(
    mut adapter_read: crate::iface::AdapterReadHalf,
    mut tls_write: WriteHalf<TlsStream<TcpStream>>,
    limiters: &Limiters,
    metrics: &Metrics,
    shutdown: &ShutdownSignal,
    filter: ProtocolFilterConfig,
    mtu: usize,
    rate_wait_cap: Duration,
    drain_cap: Duration,
) -> DirectionExit {
    let mut buf = vec![0u8; mtu + FRAME_TOLERANCE];

    loop {
        let read_result = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                return graceful_close(&mut tls_write, drain_cap).await;
            }
            r = adapter_read.read_packet(&mut buf) => r,
        };

        let n = match read_result {
            Ok(0) => return DirectionExit::Eof,
            Ok(n) => n,
            Err(e) => return DirectionExit::Error(e),
        };

        let packet = &buf[..n];
        if !is_allowed(packet, &filter) {
            metrics.record_dropped_filter();
            continue;
        }

        if let Err(exit) = acquire_with_retry(limiters.egress.bucket(), n as u64, rate_wait_cap, metrics, shutdown).await {
            return exit;
        }

        if let Err(e) = framing::write_frame(&mut tls_write, packet).await {
            return DirectionExit::Error(e);
        }
        metrics.record_bytes_out(n as u64);
        metrics.record_packet_out();
    }
}

/// Inbound: TLS -> adapter. Reads one length-prefixed frame from the peer,
/// applies the protocol filter, acquires ingress tokens, then writes the
/// packet to the local interface (spec §4.5 "Inbound").
#[allow(clippy::too_many_arguments)]
async fn inbound_loop(
    mut tls_read: ReadHalf<TlsStream<TcpStream>>,
    mut adapter_write: crate::iface::AdapterWriteHalf,
    limiters: &Limiters,
    metrics: &Metrics,
    shutdown: &ShutdownSignal,
    filter: ProtocolFilterConfig,
    max_frame: usize,
    rate_wait_cap: Duration,
) -> DirectionExit {
    loop {
        let read_result = tokio::select! {
            biased;
            _ = shutdown.wait() => return DirectionExit::Shutdown,
            r = framing::read_frame(&mut tls_read, max_frame) => r,
        };

        let packet = match read_result {
            Ok(p) => p,
            Err(TunnelError::AdapterIo(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return DirectionExit::Eof;
            }
            Err(e) => return DirectionExit::Error(e),
        };

        if !is_allowed(&packet, &filter) {
            metrics.record_dropped_filter();
            continue;
        }

        if let Err(exit) =
            acquire_with_retry(limiters.ingress.bucket(), packet.len() as u64, rate_wait_cap, metrics, shutdown).await
        {
            return exit;
        }

        if let Err(e) = adapter_write.write_packet(&packet).await {
            return DirectionExit::Error(e);
        }
        metrics.record_bytes_in(packet.len() as u64);
        metrics.record_packet_in();
    }
}

/// Acquire `n` tokens, retrying on `RateLimitTimeout` rather than dropping
/// the packet (spec §4.5 "Failure semantics": rate-limiter timeouts are
/// logged and counted but do NOT terminate the tunnel -- the caller retries
/// the acquire). Still observes the shutdown signal so a saturated limiter
/// cannot block a graceful stop indefinitely.
async fn acquire_with_retry(
    bucket: &crate::ratelimit::TokenBucket,
    n: u64,
    wait_cap: Duration,
    metrics: &Metrics,
    shutdown: &ShutdownSignal,
) -> std::result::Result<(), DirectionExit> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(DirectionExit::Shutdown),
            res = bucket.acquire(n, wait_cap) => {
                match res {
                    Ok(()) => return Ok(()),
                    Err(TunnelError::RateLimitTimeout) => {
                        metrics.record_rate_limit_hit();
                        continue;
                    }
                    Err(e) => return Err(DirectionExit::Error(e)),
                }
            }
        }
    }
}

/// On a graceful shutdown signal, stop reading new packets, close the TLS
/// session for writing (sends `close_notify`), and give the peer up to
/// `drain_cap` to observe it before returning (spec §4.5 "Shutdown").
async fn graceful_close(tls_write: &mut WriteHalf<TlsStream<TcpStream>>, drain_cap: Duration) -> DirectionExit {
    match timeout(drain_cap, tls_write.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => info!(error = %e, "tls write-half shutdown returned an error during drain"),
        Err(_) => info!("tls write-half shutdown exceeded drain cap"),
    }
    DirectionExit::Shutdown
}

pub type EngineResult = Result<ExitReason>;

#[cfg(test)]
mod tests {
    use super::*;

    // Exercising `run` end-to-end needs a real kernel TUN device and a real
    // TLS handshake over a socket pair; that is covered by the environment-
    // dependent integration suite, not here (see e2e notes). These tests
    // pin down the pure exit-classification logic instead.

    #[test]
    fn error_on_either_side_wins() {
        let err = TunnelError::Protocol("boom".into());
        match classify_exit(DirectionExit::Error(err), DirectionExit::Shutdown) {
            ExitReason::Error(TunnelError::Protocol(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn eof_on_outbound_is_adapter_eof() {
        assert!(matches!(classify_exit(DirectionExit::Eof, DirectionExit::Shutdown), ExitReason::AdapterEof));
    }

    #[test]
    fn eof_on_inbound_is_peer_closed() {
        assert!(matches!(classify_exit(DirectionExit::Shutdown, DirectionExit::Eof), ExitReason::PeerClosed));
    }

    #[test]
    fn mutual_shutdown_is_shutdown() {
        assert!(matches!(classify_exit(DirectionExit::Shutdown, DirectionExit::Shutdown), ExitReason::Shutdown));
    }
}
