//! PPPoE session stage (RFC 2516) followed by the PPP protocol field.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "pppoe",
    help: "support for PPP over Ethernet session traffic",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(PppoeDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PppoeSession {
    pub session_id: u16,
    pub ppp_protocol: u16,
}

pub fn parse_pppoe(bytes: &[u8]) -> Result<PppoeSession, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::PPPOE_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::PppoeTruncated))?;
    let ver_type = reader
        .read_u8(layout::PPPOE_VER_TYPE_OFFSET)
        .map_err(Violation::truncated(EventKind::PppoeTruncated))?;
    if ver_type != layout::PPPOE_VER_TYPE {
        return Err(Violation::new(EventKind::PppoeBadVersion));
    }
    let session_id = reader
        .read_u16_be(layout::PPPOE_SESSION_ID_OFFSET)
        .map_err(Violation::truncated(EventKind::PppoeTruncated))?;
    let ppp_protocol = reader
        .read_u16_be(layout::PPPOE_PPP_PROTO_OFFSET)
        .map_err(Violation::truncated(EventKind::PppoeTruncated))?;

    Ok(PppoeSession {
        session_id,
        ppp_protocol,
    })
}

fn next_for_ppp(protocol: u16) -> ProtocolId {
    match protocol {
        layout::PPP_IPV4 => ProtocolId::ETHERTYPE_IPV4,
        layout::PPP_IPV6 => ProtocolId::ETHERTYPE_IPV6,
        _ => ProtocolId::FINISHED_DECODE,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PppoeDecoder;

impl Decoder for PppoeDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_PPPOE_SESSION]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, _out: &mut DecodeOutput) -> bool {
        let session = match parse_pppoe(view.bytes()) {
            Ok(session) => session,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::PPPOE);
        ctx.layer_length = layout::PPPOE_HEADER_LEN;
        ctx.next_protocol_id = next_for_ppp(session.ppp_protocol);
        true
    }
}
