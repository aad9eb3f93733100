//! Transparent Ethernet bridging: a full Ethernet II header carried as
//! payload, e.g. inside GRE. Also the entry decoder for Ethernet captures.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, EthernetAddrs};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "trans_bridge",
    help: "support for trans-bridging",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(TransBridgeDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
}

pub fn parse_ethernet(bytes: &[u8]) -> Result<EthernetHeader, Violation> {
    let kind = EventKind::TransBridgeTruncated;
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::ETH_HEADER_LEN)
        .map_err(Violation::truncated(kind))?;

    let destination = reader
        .read_array::<6>(layout::ETH_DST_OFFSET)
        .map_err(Violation::truncated(kind))?;
    let source = reader
        .read_array::<6>(layout::ETH_SRC_OFFSET)
        .map_err(Violation::truncated(kind))?;
    let ethertype = reader
        .read_u16_be(layout::ETH_TYPE_OFFSET)
        .map_err(Violation::truncated(kind))?;

    Ok(EthernetHeader {
        destination,
        source,
        ethertype,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransBridgeDecoder;

impl Decoder for TransBridgeDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_ethernet(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::ETH);
        ctx.layer_length = layout::ETH_HEADER_LEN;
        ctx.next_protocol_id = ProtocolId::from_ethertype(header.ethertype);
        out.ethernet = Some(EthernetAddrs {
            destination: header.destination,
            source: header.source,
            ethertype: header.ethertype,
        });
        true
    }
}
