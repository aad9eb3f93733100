use std::net::IpAddr;

use etherparse::Ipv6HeaderSlice;

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, IpEndpoints};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::{ProtocolId, is_extension_header};

use super::next_after_header;

pub const API: DecoderApi = DecoderApi {
    name: "ipv6",
    help: "support for Internet protocol v6",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(Ipv6Decoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Summary {
    pub source: std::net::Ipv6Addr,
    pub destination: std::net::Ipv6Addr,
    pub hop_limit: u8,
    pub next_header: u8,
}

pub fn parse_ipv6(bytes: &[u8]) -> Result<Ipv6Summary, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::IPV6_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::Ipv6Truncated))?;
    let version = reader
        .read_u8(0)
        .map_err(Violation::truncated(EventKind::Ipv6Truncated))?
        >> 4;
    if version != 6 {
        return Err(Violation::new(EventKind::Ipv6BadVersion));
    }

    let header =
        Ipv6HeaderSlice::from_slice(bytes).map_err(|_| Violation::new(EventKind::Ipv6Truncated))?;
    Ok(Ipv6Summary {
        source: header.source_addr(),
        destination: header.destination_addr(),
        hop_limit: header.hop_limit(),
        next_header: header.next_header().0,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv6Decoder;

impl Decoder for Ipv6Decoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_IPV6, ProtocolId::IPV6_IN_IP]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_ipv6(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::IP6);
        ctx.layer_length = layout::IPV6_HEADER_LEN;
        ctx.next_protocol_id = next_after_header(header.next_header);
        out.ip = Some(IpEndpoints {
            source: IpAddr::V6(header.source),
            destination: IpAddr::V6(header.destination),
            ttl: header.hop_limit,
            transport_protocol: (!is_extension_header(header.next_header))
                .then_some(header.next_header),
        });
        true
    }
}
