//! Per-invocation decode state and the caller-owned decoded record.

use std::net::IpAddr;

use serde::Serialize;

use crate::event::{EventKind, ParserEvent};
use crate::flags::ProtoFlags;
use crate::pipeline::DecodeSummary;
use crate::protocol_id::ProtocolId;

/// Mutable state threaded between decoders during one pipeline invocation.
///
/// A fresh context is created for every packet and for every embedded decode.
/// Decoders write `layer_length` and `next_protocol_id` on success; the
/// driver resets both before each decoder call and ignores them on failure.
#[derive(Debug)]
pub struct DecodeContext {
    /// Bytes occupied by the header the last decoder parsed.
    pub layer_length: usize,
    /// Protocol to dispatch after the current layer.
    pub next_protocol_id: ProtocolId,
    flags: ProtoFlags,
    layer_count: usize,
    packet_id: u64,
    nesting: usize,
    protocol: ProtocolId,
    embedded_request: Option<ProtocolId>,
    pending: Vec<ParserEvent>,
    emitted: usize,
}

impl DecodeContext {
    pub fn new(packet_id: u64) -> Self {
        Self::nested(packet_id, 0)
    }

    pub(crate) fn nested(packet_id: u64, nesting: usize) -> Self {
        Self {
            layer_length: 0,
            next_protocol_id: ProtocolId::FINISHED_DECODE,
            flags: ProtoFlags::empty(),
            layer_count: 0,
            packet_id,
            nesting,
            protocol: ProtocolId::FINISHED_DECODE,
            embedded_request: None,
            pending: Vec::new(),
            emitted: 0,
        }
    }

    pub fn flags(&self) -> ProtoFlags {
        self.flags
    }

    /// Record that a protocol was seen. Flags are never cleared.
    pub fn mark(&mut self, flags: ProtoFlags) {
        self.flags.insert(flags);
    }

    /// Layers successfully decoded so far in this invocation.
    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn packet_id(&self) -> u64 {
        self.packet_id
    }

    pub fn nesting(&self) -> usize {
        self.nesting
    }

    /// Protocol id the current decoder was dispatched for.
    pub fn protocol(&self) -> ProtocolId {
        self.protocol
    }

    pub fn emit(&mut self, kind: EventKind) {
        self.push_event(kind, None, None);
    }

    /// Emit an event carrying the expected and observed lengths.
    pub fn emit_lengths(&mut self, kind: EventKind, expected: usize, actual: usize) {
        self.push_event(kind, Some(expected), Some(actual));
    }

    /// Ask the driver to decode the bytes following this layer as an embedded
    /// packet entered through `sentinel`.
    pub fn request_embedded(&mut self, sentinel: ProtocolId) {
        self.embedded_request = Some(sentinel);
    }

    /// Events emitted by the current layer and not yet delivered.
    pub fn pending_events(&self) -> &[ParserEvent] {
        &self.pending
    }

    /// Events delivered to the sink over the whole invocation.
    pub fn events_emitted(&self) -> usize {
        self.emitted
    }

    pub(crate) fn begin_layer(&mut self, protocol: ProtocolId) {
        self.protocol = protocol;
        self.layer_length = 0;
        self.next_protocol_id = ProtocolId::FINISHED_DECODE;
        self.embedded_request = None;
    }

    pub(crate) fn complete_layer(&mut self) {
        self.layer_count += 1;
    }

    pub(crate) fn take_embedded_request(&mut self) -> Option<ProtocolId> {
        self.embedded_request.take()
    }

    pub(crate) fn drain_events(&mut self) -> Vec<ParserEvent> {
        self.emitted += self.pending.len();
        std::mem::take(&mut self.pending)
    }

    fn push_event(&mut self, kind: EventKind, expected: Option<usize>, actual: Option<usize>) {
        self.pending.push(ParserEvent {
            kind,
            severity: kind.severity(),
            packet_id: self.packet_id,
            protocol: self.protocol,
            layer: self.layer_count,
            nesting: self.nesting,
            expected_len: expected,
            actual_len: actual,
        });
    }
}

/// Overall outcome recorded on the decoded packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeStatus {
    #[default]
    Complete,
    /// A layer failed; fields written by earlier layers are kept.
    Partial,
    /// The depth guard fired.
    Suspicious,
}

impl DecodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeStatus::Complete => "complete",
            DecodeStatus::Partial => "partial",
            DecodeStatus::Suspicious => "suspicious",
        }
    }
}

/// One decoded header, as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerRecord {
    pub protocol: ProtocolId,
    pub decoder: &'static str,
    /// Offset of the header within the buffer of its invocation.
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EthernetAddrs {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpEndpoints {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub ttl: u8,
    /// Upper-layer protocol once extension headers are skipped.
    pub transport_protocol: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransportPorts {
    pub protocol: u8,
    pub source_port: u16,
    pub destination_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IcmpInfo {
    pub version: u8,
    pub icmp_type: u8,
    pub code: u8,
}

/// Result of decoding a packet carried inside another protocol's payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedDecode {
    /// Sentinel the embedded invocation was entered through.
    pub entry: ProtocolId,
    /// Offset of the embedded bytes within the outer buffer.
    pub offset: usize,
    pub summary: DecodeSummary,
    pub output: DecodeOutput,
}

/// Decoded fields downstream inspectors read.
///
/// Owned by the caller; the pipeline only writes into it. Address fields hold
/// the innermost header of their kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeOutput {
    pub layers: Vec<LayerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetAddrs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vlan_ids: Vec<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mpls_labels: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpEndpoints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportPorts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gre_key: Option<u32>,
    pub fragmented: bool,
    pub status: DecodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Box<EmbeddedDecode>>,
}
