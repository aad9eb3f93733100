//! Network-layer decoders and IPv6 extension headers.

pub mod ipv4;
pub mod ipv6;
pub mod ipv6_ext;

use crate::protocol_id::ProtocolId;

/// Dispatch id for an IPv6 next-header value; "no next header" ends decoding.
pub(crate) fn next_after_header(next_header: u8) -> ProtocolId {
    let id = ProtocolId::from_ip_protocol(next_header);
    if id == ProtocolId::NONEXT {
        ProtocolId::FINISHED_DECODE
    } else {
        id
    }
}
