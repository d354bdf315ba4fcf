use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Role;
use crate::error::{Result, TunnelError};
use crate::telemetry::Metrics;

use super::oid_tree::{build_tree, find_exact, find_next};
use super::pdu::{decode_request, encode_response, PduKind, SnmpValue, ERR_NO_ERROR, ERR_NO_SUCH_NAME};

const MAX_DATAGRAM: usize = 1500;
const BIND_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// A read-only SNMPv2c agent exposing the counters in [`Metrics`] under the
/// enterprise OID tree (spec §4.7 "SNMP agent"). Agent failures never
/// propagate to the data plane: bind errors are retried on a fixed backoff,
/// malformed datagrams are logged and skipped.
pub struct SnmpAgent {
    address: SocketAddr,
    community: String,
    role: Role,
    version: &'static str,
    metrics: Arc<Metrics>,
}

impl SnmpAgent {
    pub fn new(address: SocketAddr, community: String, role: Role, metrics: Arc<Metrics>) -> Self {
        Self { address, community, role, version: env!("CARGO_PKG_VERSION"), metrics }
    }

    /// Runs until `cancel` fires, re-binding with a fixed backoff if the
    /// socket cannot be acquired (spec §4.7 "Failure semantics").
    pub async fn serve_forever(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match self.serve_once(&cancel).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, address = %self.address, "SNMP agent failed, retrying in 5s");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(BIND_RETRY_BACKOFF) => {}
                    }
                }
            }
        }
    }

    async fn serve_once(&self, cancel: &CancellationToken) -> Result<()> {
        let socket = UdpSocket::bind(self.address).await.map_err(TunnelError::AdapterIo)?;
        info!(address = %self.address, "SNMP agent listening");

        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = socket.recv_from(&mut buf) => result.map_err(TunnelError::AdapterIo)?,
            };

            if let Some(response) = self.handle_datagram(&buf[..len], peer) {
                if let Err(e) = socket.send_to(&response, peer).await {
                    warn!(%peer, error = %e, "SNMP agent: send failed");
                }
            }
        }
    }

    fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        let request = match decode_request(datagram) {
            Ok(r) => r,
            Err(e) => {
                debug!(%peer, error = %e, "SNMP agent: malformed datagram, dropping");
                return None;
            }
        };

        if request.community != self.community.as_bytes() {
            debug!(%peer, "SNMP agent: community string mismatch, dropping");
            return None;
        }

        let snapshot = self.metrics.snapshot();
        let tree = build_tree(&snapshot, self.role, self.version);

        let mut varbinds = Vec::new();
        let mut error_status = ERR_NO_ERROR;
        let mut error_index = 0i64;

        match request.kind {
            PduKind::GetRequest => {
                for (idx, oid) in request.oids.iter().enumerate() {
                    match find_exact(&tree, oid) {
                        Some(value) => varbinds.push((oid.clone(), value.clone())),
                        None => {
                            if error_status == ERR_NO_ERROR {
                                error_status = ERR_NO_SUCH_NAME;
                                error_index = idx as i64 + 1;
                            }
                            varbinds.push((oid.clone(), SnmpValue::Null));
                        }
                    }
                }
            }
            PduKind::GetNextRequest => {
                for oid in &request.oids {
                    match find_next(&tree, oid) {
                        Some((next_oid, value)) => varbinds.push((next_oid.clone(), value.clone())),
                        None => varbinds.push((oid.clone(), SnmpValue::EndOfMibView)),
                    }
                }
            }
            PduKind::GetBulkRequest => {
                let non_repeaters = request.non_repeaters.max(0) as usize;
                let max_repetitions = request.max_repetitions.max(0) as usize;

                for oid in request.oids.iter().take(non_repeaters) {
                    match find_next(&tree, oid) {
                        Some((next_oid, value)) => varbinds.push((next_oid.clone(), value.clone())),
                        None => varbinds.push((oid.clone(), SnmpValue::EndOfMibView)),
                    }
                }
                for oid in request.oids.iter().skip(non_repeaters) {
                    let mut cursor = oid.clone();
                    for _ in 0..max_repetitions.max(1) {
                        match find_next(&tree, &cursor) {
                            Some((next_oid, value)) => {
                                varbinds.push((next_oid.clone(), value.clone()));
                                cursor = next_oid.clone();
                            }
                            None => {
                                varbinds.push((cursor.clone(), SnmpValue::EndOfMibView));
                                break;
                            }
                        }
                    }
                }
            }
        }

        match encode_response(&self.community.as_bytes().to_vec(), request.request_id, error_status, error_index, &varbinds) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%peer, error = %e, "SNMP agent: failed to encode response");
                None
            }
        }
    }
}
