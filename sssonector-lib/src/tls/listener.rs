use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::error::{Result, TunnelError};

use super::acceptor::build_acceptor;
use super::session::TlsSession;
use crate::config::TlsConfig;

/// Server-side listener: accepts TCP connections and drives the mutual-TLS
/// handshake (spec §4.3 "Server side").
pub struct Listener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl Listener {
    pub async fn bind(endpoint: SocketAddr, cfg: &TlsConfig) -> Result<Self> {
        let acceptor = build_acceptor(cfg)?;
        let listener = TcpListener::bind(endpoint).await.map_err(TunnelError::AdapterIo)?;
        Ok(Self { listener, acceptor })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TunnelError::AdapterIo)
    }

    /// Accept one TCP connection and complete the TLS handshake, blocking
    /// until a peer connects (spec §4.3 "blocks until a peer completes the
    /// handshake").
    pub async fn accept(&self) -> Result<(TlsSession, SocketAddr)> {
        let (tcp, peer) = self.listener.accept().await.map_err(TunnelError::AdapterIo)?;
        tcp.set_nodelay(true).ok();
        let tls = self
            .acceptor
            .accept(tcp)
            .await
            .map_err(|e| TunnelError::Tls(format!("handshake with {peer} failed: {e}")))?;

        let (version, cipher, subject) = {
            let (_, connection) = tls.get_ref();
            let version = connection.protocol_version().map(|v| format!("{v:?}")).unwrap_or_default();
            let cipher = connection
                .negotiated_cipher_suite()
                .map(|cs| format!("{:?}", cs.suite()))
                .unwrap_or_default();
            let subject = connection
                .peer_certificates()
                .and_then(|certs| certs.first())
                .map(|cert| format!("{cert:?}"))
                .unwrap_or_else(|| "unknown".to_string());
            (version, cipher, subject)
        };

        let stream: tokio_rustls::TlsStream<tokio::net::TcpStream> = tls.into();
        Ok((TlsSession::new(stream, cipher, version, subject), peer))
    }
}
