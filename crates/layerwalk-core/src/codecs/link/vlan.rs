//! 802.1Q and 802.1ad tags. Each tag is its own layer, so stacked tags walk
//! the loop once per tag and count against the depth budget.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "vlan",
    help: "support for 802.1Q and 802.1ad tags",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(VlanDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    pub priority: u8,
    pub dei: bool,
    pub vlan_id: u16,
    pub inner_type: u16,
}

pub fn parse_vlan(bytes: &[u8]) -> Result<VlanTag, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::VLAN_TAG_LEN)
        .map_err(Violation::truncated(EventKind::VlanTruncated))?;
    let tci = reader
        .read_u16_be(layout::VLAN_TCI_OFFSET)
        .map_err(Violation::truncated(EventKind::VlanTruncated))?;
    let inner_type = reader
        .read_u16_be(layout::VLAN_TYPE_OFFSET)
        .map_err(Violation::truncated(EventKind::VlanTruncated))?;

    Ok(VlanTag {
        priority: (tci >> 13) as u8,
        dei: tci & 0x1000 != 0,
        vlan_id: tci & layout::VLAN_ID_MASK,
        inner_type,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VlanDecoder;

impl Decoder for VlanDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_8021Q, ProtocolId::ETHERTYPE_8021AD]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let tag = match parse_vlan(view.bytes()) {
            Ok(tag) => tag,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::VLAN);
        ctx.layer_length = layout::VLAN_TAG_LEN;
        ctx.next_protocol_id = ProtocolId::from_ethertype(tag.inner_type);
        out.vlan_ids.push(tag.vlan_id);
        true
    }
}
