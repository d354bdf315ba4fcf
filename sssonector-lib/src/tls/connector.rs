use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::{info, warn};

use crate::config::TlsConfig;
use crate::error::{Result, TunnelError};

use super::acceptor::{load_ca_roots, load_certs, load_key};
use super::session::TlsSession;

fn build_connector(cfg: &TlsConfig) -> Result<TlsConnector> {
    let certs = load_certs(&cfg.cert_path)?;
    let key = load_key(&cfg.key_path)?;
    let roots = load_ca_roots(&cfg.ca_path)?;

    let versions = cfg.options.rustls_protocol_versions().map_err(TunnelError::Config)?;
    let client = ClientConfig::builder_with_protocol_versions(versions)
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| TunnelError::Tls(format!("build client TLS config: {e}")))?;

    Ok(TlsConnector::from(Arc::new(client)))
}

fn extract_session_info<T>(stream: &tokio_rustls::client::TlsStream<T>) -> (String, String) {
    let (_, connection) = stream.get_ref();
    let version = connection.protocol_version().map(|v| format!("{v:?}")).unwrap_or_default();
    let cipher = connection
        .negotiated_cipher_suite()
        .map(|cs| format!("{:?}", cs.suite()))
        .unwrap_or_default();
    (version, cipher)
}

/// Dial `endpoint` and establish a mutually-authenticated TLS session,
/// retrying both transient connection failures and handshake failures
/// (chain, expiry, cipher mismatch) with exponential backoff (initial 1s,
/// factor 2, cap 60s) per spec §4.3 "Client side" / "Failure semantics":
/// the client only abandons an attempt on `cancel`, never by giving up on
/// retries. Returns `Err` exactly when `cancel` fires.
pub async fn dial(
    endpoint: SocketAddr,
    cfg: &TlsConfig,
    sni: &str,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<TlsSession> {
    let connector = build_connector(cfg)?;
    let server_name = ServerName::try_from(sni.to_string())
        .map_err(|e| TunnelError::Tls(format!("invalid server name {sni}: {e}")))?;

    let mut backoff = Duration::from_secs(1);
    const MAX_BACKOFF: Duration = Duration::from_secs(60);

    loop {
        let attempt = async {
            let tcp = TcpStream::connect(endpoint)
                .await
                .map_err(TunnelError::AdapterIo)?;
            tcp.set_nodelay(true).ok();
            let tls = connector
                .connect(server_name.clone(), tcp)
                .await
                .map_err(|e| TunnelError::Tls(format!("handshake failed: {e}")))?;
            Ok::<_, TunnelError>(tls)
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(TunnelError::Tls("dial cancelled".into()));
            }
            result = attempt => {
                match result {
                    Ok(tls) => {
                        let (version, cipher) = extract_session_info(&tls);
                        info!(%endpoint, %cipher, %version, "client TLS session established");
                        let stream: tokio_rustls::TlsStream<TcpStream> = tls.into();
                        return Ok(TlsSession::new(stream, cipher, version, sni.to_string()));
                    }
                    Err(e) => {
                        warn!(%endpoint, error = %e, backoff_secs = backoff.as_secs(), "dial failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(TunnelError::Tls("dial cancelled".into())),
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }
    }
}
