use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use crate::error::{Result, TunnelError};

/// Carves client addresses out of the tunnel's interface CIDR (spec §4.6
/// "Addressing"). The first usable host address is reserved for the
/// server's own interface; the rest are handed out to clients in
/// insertion order and returned to the pool when a session ends.
pub struct AddressPool {
    prefix_len: u8,
    available: Mutex<VecDeque<Ipv4Addr>>,
}

impl AddressPool {
    pub fn new(cidr: &str) -> Result<Self> {
        let net: ipnet::Ipv4Net = cidr
            .parse()
            .map_err(|e| TunnelError::Config(format!("invalid interface cidr {cidr}: {e}")))?;
        let mut hosts = net.hosts();
        hosts
            .next()
            .ok_or_else(|| TunnelError::Config(format!("cidr {cidr} has no usable host addresses")))?;
        let available: VecDeque<Ipv4Addr> = hosts.collect();
        Ok(Self { prefix_len: net.prefix_len(), available: Mutex::new(available) })
    }

    /// Hand out the next free address, or `AddressPoolExhausted` if none
    /// remain (spec §4.6 "Addressing").
    pub fn allocate(&self) -> Result<Ipv4Addr> {
        let mut available = self.available.lock().expect("address pool mutex poisoned");
        available.pop_front().ok_or(TunnelError::AddressPoolExhausted)
    }

    /// Return an address to the pool once its session ends.
    pub fn release(&self, addr: Ipv4Addr) {
        let mut available = self.available.lock().expect("address pool mutex poisoned");
        available.push_back(addr);
    }

    /// CIDR prefix length shared by every address this pool hands out, used
    /// to build the per-session adapter's own CIDR string.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_first_address_for_the_server() {
        let pool = AddressPool::new("10.0.0.0/30").unwrap();
        // /30 has two usable hosts: .1 and .2. The server keeps .1.
        let first = pool.allocate().unwrap();
        assert_eq!(first, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn exhaustion_is_reported_and_release_recycles() {
        let pool = AddressPool::new("10.0.0.0/30").unwrap();
        pool.allocate().unwrap();
        let err = pool.allocate().unwrap_err();
        assert!(matches!(err, TunnelError::AddressPoolExhausted));

        pool.release(Ipv4Addr::new(10, 0, 0, 2));
        assert!(pool.allocate().is_ok());
    }
}
