use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, Ia5String, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use time::OffsetDateTime;

use crate::error::{Result, TunnelError};

use super::{DEFAULT_VALIDITY_DAYS, EPHEMERAL_VALIDITY_SECS};

const CA_FILE: &str = "ca.pem";
const CA_KEY_FILE: &str = "ca-key.pem";
const SERVER_CERT_FILE: &str = "server.pem";
const SERVER_KEY_FILE: &str = "server-key.pem";
const CLIENT_CERT_FILE: &str = "client.pem";
const CLIENT_KEY_FILE: &str = "client-key.pem";

fn write_key(path: &Path, pem: &str) -> Result<()> {
    fs::write(path, pem).map_err(|e| TunnelError::Certificate(format!("write {path:?}: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| TunnelError::Certificate(format!("chmod {path:?}: {e}")))?;
    }
    Ok(())
}

fn write_cert(path: &Path, pem: &str) -> Result<()> {
    fs::write(path, pem).map_err(|e| TunnelError::Certificate(format!("write {path:?}: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))
            .map_err(|e| TunnelError::Certificate(format!("chmod {path:?}: {e}")))?;
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| TunnelError::Certificate(format!("create cert dir {dir:?}: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| TunnelError::Certificate(format!("chmod cert dir {dir:?}: {e}")))?;
    }
    Ok(())
}

fn leaf_params(cn: &str, not_after: OffsetDateTime) -> Result<CertificateParams> {
    let mut params = CertificateParams::new(vec![])
        .map_err(|e| TunnelError::Certificate(format!("invalid cert params: {e}")))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.not_before = OffsetDateTime::now_utc() - Duration::from_secs(60);
    params.not_after = not_after;
    params.subject_alt_names = vec![SanType::DnsName(
        Ia5String::try_from(cn.to_string())
            .map_err(|e| TunnelError::Certificate(format!("invalid SAN: {e}")))?,
    )];
    Ok(params)
}

/// Generate the root CA (1-year validity by default) and write `ca.pem` /
/// `ca-key.pem` into `dir` with policy permissions.
pub fn generate_ca(dir: &Path) -> Result<()> {
    ensure_dir(dir)?;
    let mut params = CertificateParams::new(vec![])
        .map_err(|e| TunnelError::Certificate(format!("invalid CA params: {e}")))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "sssonector-ca");
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.not_before = OffsetDateTime::now_utc() - Duration::from_secs(60);
    params.not_after = OffsetDateTime::now_utc() + time::Duration::days(DEFAULT_VALIDITY_DAYS);

    let key_pair =
        KeyPair::generate().map_err(|e| TunnelError::Certificate(format!("keygen: {e}")))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| TunnelError::Certificate(format!("self-sign CA: {e}")))?;

    write_cert(&dir.join(CA_FILE), cert.pem().as_str())?;
    write_key(&dir.join(CA_KEY_FILE), key_pair.serialize_pem().as_str())?;
    Ok(())
}

fn load_ca(dir: &Path) -> Result<(rcgen::Certificate, KeyPair)> {
    let ca_pem = fs::read_to_string(dir.join(CA_FILE))
        .map_err(|e| TunnelError::Certificate(format!("read ca.pem: {e}")))?;
    let ca_key_pem = fs::read_to_string(dir.join(CA_KEY_FILE))
        .map_err(|e| TunnelError::Certificate(format!("read ca-key.pem: {e}")))?;
    let key_pair = KeyPair::from_pem(&ca_key_pem)
        .map_err(|e| TunnelError::Certificate(format!("parse ca key: {e}")))?;
    let params = CertificateParams::from_ca_cert_pem(&ca_pem)
        .map_err(|e| TunnelError::Certificate(format!("parse ca cert: {e}")))?;
    let ca_cert = params
        .self_signed(&key_pair)
        .map_err(|e| TunnelError::Certificate(format!("reconstruct ca cert: {e}")))?;
    Ok((ca_cert, key_pair))
}

fn generate_leaf(dir: &Path, cn: &str, cert_file: &str, key_file: &str, validity: i64, ephemeral: bool) -> Result<()> {
    ensure_dir(dir)?;
    let (ca_cert, ca_key) = load_ca(dir)?;

    let not_after = if ephemeral {
        OffsetDateTime::now_utc() + Duration::from_secs(validity as u64)
    } else {
        OffsetDateTime::now_utc() + time::Duration::days(validity)
    };

    let params = leaf_params(cn, not_after)?;
    let key_pair =
        KeyPair::generate().map_err(|e| TunnelError::Certificate(format!("keygen: {e}")))?;
    let cert = params
        .signed_by(&key_pair, &ca_cert, &ca_key)
        .map_err(|e| TunnelError::Certificate(format!("sign leaf: {e}")))?;

    write_cert(&dir.join(cert_file), cert.pem().as_str())?;
    write_key(&dir.join(key_file), key_pair.serialize_pem().as_str())?;
    Ok(())
}

/// Generate a server leaf certificate signed by the CA in `dir`.
pub fn generate_server(dir: &Path, ca: &Path) -> Result<()> {
    let _ = ca; // CA material lives alongside leaf material in `dir`.
    generate_leaf(dir, "sssonector-server", SERVER_CERT_FILE, SERVER_KEY_FILE, DEFAULT_VALIDITY_DAYS, false)
}

/// Generate a client leaf certificate signed by the CA in `dir`.
pub fn generate_client(dir: &Path, ca: &Path) -> Result<()> {
    let _ = ca;
    generate_leaf(dir, "sssonector-client", CLIENT_CERT_FILE, CLIENT_KEY_FILE, DEFAULT_VALIDITY_DAYS, false)
}

/// Generate CA + server + client certificates whose `NotAfter` is 15 seconds
/// in the future, used solely for connectivity smoke tests
/// (`-test-without-certs`).
pub fn generate_temporary(dir: &Path) -> Result<()> {
    ensure_dir(dir)?;
    generate_ca(dir)?;
    generate_leaf(
        dir,
        "sssonector-server",
        SERVER_CERT_FILE,
        SERVER_KEY_FILE,
        EPHEMERAL_VALIDITY_SECS,
        true,
    )?;
    generate_leaf(
        dir,
        "sssonector-client",
        CLIENT_CERT_FILE,
        CLIENT_KEY_FILE,
        EPHEMERAL_VALIDITY_SECS,
        true,
    )?;
    Ok(())
}

pub(super) fn cert_paths(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (dir.join(CA_FILE), dir.join(SERVER_CERT_FILE), dir.join(CLIENT_CERT_FILE))
}

/// Private key paths for the server and client leaf certificates returned
/// by [`cert_paths`], in the same order.
pub(super) fn key_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(SERVER_KEY_FILE), dir.join(CLIENT_KEY_FILE))
}

/// File layout `generate_ca`/`generate_server`/`generate_client` write into
/// `dir`, resolved for the endpoint's own role so `app` can point a
/// [`crate::config::TlsConfig`] at the right cert/key/ca triple.
pub fn material_paths(dir: &Path, role: crate::config::Role) -> (PathBuf, PathBuf, PathBuf) {
    let ca = dir.join(CA_FILE);
    match role {
        crate::config::Role::Server => (dir.join(SERVER_CERT_FILE), dir.join(SERVER_KEY_FILE), ca),
        crate::config::Role::Client => (dir.join(CLIENT_CERT_FILE), dir.join(CLIENT_KEY_FILE), ca),
    }
}
