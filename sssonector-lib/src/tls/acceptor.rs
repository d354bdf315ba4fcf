use std::sync::Arc;

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;
use crate::error::{Result, TunnelError};

pub(crate) fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let bytes =
        std::fs::read(path).map_err(|e| TunnelError::Tls(format!("read certificate {path}: {e}")))?;
    CertificateDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TunnelError::Tls(format!("parse certificate {path}: {e}")))
}

pub(crate) fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path).map_err(|e| TunnelError::Tls(format!("read key {path}: {e}")))?;
    let mut keys: Vec<PrivateKeyDer<'static>> = PrivateKeyDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TunnelError::Tls(format!("parse key {path}: {e}")))?;
    keys.pop().ok_or_else(|| TunnelError::Tls(format!("no private key found in {path}")))
}

pub(crate) fn load_ca_roots(path: &str) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|e| TunnelError::ChainInvalid(format!("invalid CA certificate: {e}")))?;
    }
    Ok(roots)
}

/// Build a server-side TLS acceptor requiring mutual authentication: the
/// peer must present a certificate chaining to `cfg.ca_path` (spec §4.3
/// "Mutual authentication is mandatory").
pub fn build_acceptor(cfg: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = load_certs(&cfg.cert_path)?;
    let key = load_key(&cfg.key_path)?;
    let roots = load_ca_roots(&cfg.ca_path)?;

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| TunnelError::Tls(format!("build client verifier: {e}")))?;

    let versions = cfg.options.rustls_protocol_versions().map_err(TunnelError::Config)?;
    let mut server = ServerConfig::builder_with_protocol_versions(versions)
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| TunnelError::Tls(format!("build server TLS config: {e}")))?;

    super::session_resumption::configure_session_resumption(&mut server, &cfg.session_resumption);

    Ok(TlsAcceptor::from(Arc::new(server)))
}
