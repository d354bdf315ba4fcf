//! Certificate Authority & Validator (spec §4.2): CA/server/client material
//! generation, chain/expiry/key-match validation, and the background expiry
//! watcher that drives ephemeral test-mode shutdown.

mod authority;
mod validator;
mod watcher;

pub use authority::{generate_ca, generate_client, generate_server, generate_temporary, material_paths};
pub use validator::{validate, ValidationReport};
pub use watcher::{spawn_expiry_watcher, ExpiryWatcherHandle};

/// Default validity of generated CA/server/client certificates.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;
/// Validity of `-test-without-certs` ephemeral certificates.
pub const EPHEMERAL_VALIDITY_SECS: i64 = 15;
/// Warning window before production certificate expiry.
pub const PRODUCTION_WARNING_WINDOW_DAYS: i64 = 30;
