//! Link-layer and shim decoders keyed by ethertype.

pub mod arp;
pub mod mpls;
pub mod pppoe;
pub mod trans_bridge;
pub mod vlan;
