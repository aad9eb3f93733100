//! Builtin decoders.
//!
//! Each decoder validates its own header through a bounds-checked
//! `ByteReader` before reading any field, reports a failed header as exactly
//! one event, and never looks past the layer it owns. Header offsets and
//! masks live in `layout`; rejection reasons in `error`.

pub mod error;
pub mod gre;
pub mod ip;
pub mod layout;
pub mod link;
pub(crate) mod reader;
pub mod transport;

use crate::decoder::DecoderApi;

/// Statically linked decoder set, in registration order.
pub static BUILTIN_DECODERS: &[DecoderApi] = &[
    link::trans_bridge::API,
    link::vlan::API,
    link::arp::API,
    link::pppoe::API,
    link::mpls::API,
    ip::ipv4::API,
    ip::ipv6::API,
    ip::ipv6_ext::API,
    ip::ipv6_ext::FRAG_API,
    ip::ipv6_ext::AUTH_API,
    gre::API,
    transport::udp::API,
    transport::tcp::API,
    transport::icmp::ICMP4_API,
    transport::icmp::ICMP6_API,
];
