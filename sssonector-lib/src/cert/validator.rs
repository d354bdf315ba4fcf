use std::fs;
use std::path::Path;
use std::time::SystemTime;

use rcgen::KeyPair;
use x509_parser::prelude::*;

use crate::error::{Result, TunnelError};

use super::authority::{cert_paths, key_paths};

/// Outcome of `validate`: one entry per certificate checked.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub ca_subject: String,
    pub server_subject: String,
    pub client_subject: String,
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| TunnelError::Certificate(format!("read {path:?}: {e}")))
}

fn check_permissions(path: &Path, is_key: bool) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)
            .map_err(|e| TunnelError::Certificate(format!("stat {path:?}: {e}")))?
            .permissions()
            .mode()
            & 0o777;
        let max_allowed = if is_key { 0o600 } else { 0o644 };
        if mode & !max_allowed != 0 {
            return Err(TunnelError::PermissionsTooPermissive(format!(
                "{path:?} has mode {mode:o}, policy allows at most {max_allowed:o}"
            )));
        }
    }
    let _ = path;
    Ok(())
}

/// Check that `key_path`'s private key produces the public key embedded in
/// `cert` (spec §4.2 requirement (c), public/private key match), by
/// comparing the raw public key bytes rather than requiring an exact
/// private-key-format match.
fn check_key_matches_cert(key_path: &Path, cert: &X509Certificate<'_>) -> Result<()> {
    let key_pem = fs::read_to_string(key_path)
        .map_err(|e| TunnelError::Certificate(format!("read {key_path:?}: {e}")))?;
    let key_pair = KeyPair::from_pem(&key_pem)
        .map_err(|e| TunnelError::Certificate(format!("parse {key_path:?}: {e}")))?;

    let key_public = key_pair.public_key_raw();
    let cert_public = cert.public_key().subject_public_key.data.as_ref();
    if key_public != cert_public {
        return Err(TunnelError::KeyMismatch(format!(
            "{key_path:?} does not match the public key in {:?}",
            cert.subject()
        )));
    }
    Ok(())
}

/// Parse each certificate file in `dir`, verify (a) server and client chain
/// to the CA, (b) `NotBefore <= now < NotAfter`, (c) permissions are not
/// looser than policy, (d) each leaf's private key matches the public key
/// in its certificate.
pub fn validate(dir: &Path) -> Result<ValidationReport> {
    let (ca_path, server_path, client_path) = cert_paths(dir);
    let (server_key_path, client_key_path) = key_paths(dir);

    check_permissions(&ca_path, false)?;
    check_permissions(&server_path, false)?;
    check_permissions(&client_path, false)?;
    check_permissions(&server_key_path, true)?;
    check_permissions(&client_key_path, true)?;

    let ca_bytes = read_pem(&ca_path)?;
    let server_bytes = read_pem(&server_path)?;
    let client_bytes = read_pem(&client_path)?;

    let (_, ca_pem) = parse_x509_pem(&ca_bytes)
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid ca PEM: {e}")))?;
    let ca_cert = ca_pem
        .parse_x509()
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid ca certificate: {e}")))?;

    let (_, server_pem) = parse_x509_pem(&server_bytes)
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid server PEM: {e}")))?;
    let server_cert = server_pem
        .parse_x509()
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid server certificate: {e}")))?;

    let (_, client_pem) = parse_x509_pem(&client_bytes)
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid client PEM: {e}")))?;
    let client_cert = client_pem
        .parse_x509()
        .map_err(|e| TunnelError::ChainInvalid(format!("invalid client certificate: {e}")))?;

    for leaf in [&server_cert, &client_cert] {
        if leaf.issuer() != ca_cert.subject() {
            return Err(TunnelError::ChainInvalid(format!(
                "issuer {:?} does not match CA subject {:?}",
                leaf.issuer(),
                ca_cert.subject()
            )));
        }
        if leaf
            .verify_signature(Some(ca_cert.public_key()))
            .is_err()
        {
            return Err(TunnelError::ChainInvalid("signature verification failed".into()));
        }
    }

    check_key_matches_cert(&server_key_path, &server_cert)?;
    check_key_matches_cert(&client_key_path, &client_cert)?;

    let now = ASN1Time::from(SystemTime::now());
    for cert in [&ca_cert, &server_cert, &client_cert] {
        let validity = cert.validity();
        if now < validity.not_before {
            return Err(TunnelError::NotYetValid);
        }
        if now >= validity.not_after {
            return Err(TunnelError::Expired);
        }
    }

    Ok(ValidationReport {
        ca_subject: ca_cert.subject().to_string(),
        server_subject: server_cert.subject().to_string(),
        client_subject: client_cert.subject().to_string(),
    })
}
