use thiserror::Error;

/// Error taxonomy for the tunnel core, mirroring the abstract kinds of the
/// specification: configuration, certificate, adapter, transport, rate-limit,
/// state-machine and shutdown-timeout failures each get their own variant
/// group so callers can match on kind without parsing strings.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("certificate chain invalid: {0}")]
    ChainInvalid(String),
    #[error("certificate not yet valid")]
    NotYetValid,
    #[error("certificate expired")]
    Expired,
    #[error("certificate public key does not match private key: {0}")]
    KeyMismatch(String),
    #[error("file permissions looser than policy: {0}")]
    PermissionsTooPermissive(String),
    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("adapter create failed: {0}")]
    AdapterCreate(String),
    #[error("adapter read/write failed: {0}")]
    AdapterIo(std::io::Error),
    #[error("adapter cleanup exceeded timeout")]
    CleanupTimeout,
    #[error("invalid interface state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: &'static str, to: &'static str },

    #[error("TLS error: {0}")]
    Tls(String),
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("rate limit wait exceeded deadline")]
    RateLimitTimeout,
    #[error("rate adjustment rejected: cooldown active")]
    CooldownActive,
    #[error("rate adjustment rejected: out of range")]
    OutOfRange,

    #[error("shutdown exceeded its deadline")]
    ShutdownTimeout,

    #[error("no addresses remaining in tunnel CIDR")]
    AddressPoolExhausted,

    #[error("metrics/health surface error: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelError {
    /// Maps this error onto the process exit codes in spec §6: 1
    /// configuration, 2 certificate, 3 adapter, 4 network, 5 runtime.
    pub fn exit_code(&self) -> i32 {
        match self {
            TunnelError::Config(_) => 1,
            TunnelError::ChainInvalid(_)
            | TunnelError::NotYetValid
            | TunnelError::Expired
            | TunnelError::KeyMismatch(_)
            | TunnelError::PermissionsTooPermissive(_)
            | TunnelError::Certificate(_) => 2,
            TunnelError::AdapterCreate(_) | TunnelError::AdapterIo(_) | TunnelError::CleanupTimeout | TunnelError::InvalidStateTransition { .. } => 3,
            TunnelError::Tls(_) | TunnelError::Protocol(_) | TunnelError::Io(_) => 4,
            TunnelError::RateLimitTimeout
            | TunnelError::CooldownActive
            | TunnelError::OutOfRange
            | TunnelError::ShutdownTimeout
            | TunnelError::AddressPoolExhausted
            | TunnelError::Metrics(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, TunnelError>;
