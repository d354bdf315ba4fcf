#![forbid(unsafe_code)]

//! Core data plane and control plane for the SSSonector point-to-point
//! tunnel: a mutually-authenticated TLS transport between two virtual
//! network interfaces, with token-bucket shaping, certificate lifecycle
//! management, and data-plane telemetry.
//!
//! This crate does not parse CLI flags or own a kernel TUN device on its
//! own initiative; the `sssonector` binary crate is the thin entry point
//! that wires configuration, certificates and role (server/client) into
//! the [`app`] orchestration functions.

pub mod app;
pub mod cert;
pub mod config;
pub mod connmgr;
pub mod error;
pub mod iface;
pub mod ratelimit;
pub mod telemetry;
pub mod tls;
pub mod transfer;

pub use config::{load_from_path, Config};
pub use error::{Result, TunnelError};
