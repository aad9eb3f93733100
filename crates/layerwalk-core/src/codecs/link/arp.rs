use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "arp",
    help: "support for address resolution protocol",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(ArpDecoder)
}

/// Total length of an ARP/RARP packet, address fields included.
pub fn arp_packet_len(bytes: &[u8]) -> Result<usize, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::ARP_FIXED_LEN)
        .map_err(Violation::truncated(EventKind::ArpTruncated))?;
    let hlen = reader
        .read_u8(layout::ARP_HLEN_OFFSET)
        .map_err(Violation::truncated(EventKind::ArpTruncated))? as usize;
    let plen = reader
        .read_u8(layout::ARP_PLEN_OFFSET)
        .map_err(Violation::truncated(EventKind::ArpTruncated))? as usize;
    if hlen == 0 || plen == 0 {
        return Err(Violation::new(EventKind::ArpBadAddressLength));
    }

    let total = layout::ARP_FIXED_LEN + 2 * (hlen + plen);
    reader
        .require_len(total)
        .map_err(Violation::truncated(EventKind::ArpTruncated))?;
    Ok(total)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArpDecoder;

impl Decoder for ArpDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_ARP, ProtocolId::ETHERTYPE_REVARP]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, _out: &mut DecodeOutput) -> bool {
        let length = match arp_packet_len(view.bytes()) {
            Ok(length) => length,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::ARP);
        ctx.layer_length = length;
        ctx.next_protocol_id = ProtocolId::FINISHED_DECODE;
        true
    }
}
