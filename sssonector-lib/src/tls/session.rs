use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::TlsStream;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One authenticated peer connection (spec §3 "TLS Session"). Owned by the
/// Connection Manager in server mode (one per accepted peer) or by the
/// client bootstrap (exactly one); lifetime ends on either endpoint
/// closing, a fatal I/O error, or shutdown.
pub struct TlsSession {
    pub id: u64,
    pub cipher_suite: String,
    pub protocol_version: String,
    pub peer_subject: String,
    stream: TlsStream<TcpStream>,
}

impl TlsSession {
    pub fn new(stream: TlsStream<TcpStream>, cipher_suite: String, protocol_version: String, peer_subject: String) -> Self {
        Self { id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed), cipher_suite, protocol_version, peer_subject, stream }
    }

    /// Split into independent read/write halves so the Transfer Engine can
    /// run its inbound and outbound activities as two concurrent tasks over
    /// the same underlying connection (spec §5 "Shared resources": the TLS
    /// session is owned by exactly one Transfer Engine, but the two
    /// directions share it).
    pub fn split(self) -> (ReadHalf<TlsStream<TcpStream>>, WriteHalf<TlsStream<TcpStream>>) {
        tokio::io::split(self.stream)
    }
}
