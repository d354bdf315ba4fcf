//! Tunnel Transfer Engine (spec §4.5): the data plane that shuttles IP
//! packets between a Virtual Interface Adapter and a TLS Session.

mod engine;
mod filter;
mod shutdown;

pub use engine::{run, EngineConfig, ExitReason};
pub use shutdown::ShutdownSignal;
