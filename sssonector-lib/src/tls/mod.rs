//! TLS Transport (spec §4.3): mutually-authenticated TLS 1.2/1.3 sessions,
//! the length-prefixed frame codec that carries IP packets over them, and
//! the cipher/curve policy surfaces used by configuration validation.

mod acceptor;
pub mod cipher_suites;
mod connector;
pub mod curves;
pub mod framing;
mod listener;
mod session;
mod session_resumption;

pub use acceptor::build_acceptor;
pub use cipher_suites::{is_cipher_suite_supported, supported_cipher_suites};
pub use connector::dial;
pub use curves::{is_curve_supported, supported_curves};
pub use listener::Listener;
pub use session::TlsSession;
