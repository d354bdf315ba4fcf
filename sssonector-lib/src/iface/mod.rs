//! Virtual Interface Adapter (spec §4.1): kernel TUN device lifecycle,
//! platform abstraction, and bounded cleanup.

mod adapter;
mod state;

pub use adapter::{
    AdapterCleanup, AdapterReadHalf, AdapterWriteHalf, PlatformCapabilities, TunAdapter,
    VirtualInterfaceAdapter,
};
pub use state::{InterfaceState, StateMachine};
