//! Hand-rolled, read-only SNMPv2c agent (spec §4.7). No SNMP crate exists in
//! the corpus, so the wire format is encoded/decoded directly, following the
//! same small-explicit-binary-codec idiom the corpus uses elsewhere for
//! length-prefixed frame formats.

mod agent;
mod ber;
mod oid_tree;
mod pdu;

pub use agent::SnmpAgent;
pub use oid_tree::ENTERPRISE_ROOT;
