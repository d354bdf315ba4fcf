//! Connection Manager (spec §4.6): the server-side acceptance loop with
//! per-client tunnel spawn, and the client-side dial-and-reconnect loop.

mod client;
mod pool;
mod server;

pub use client::Client;
pub use pool::AddressPool;
pub use server::Server;
