//! The dispatch loop.
//!
//! One invocation walks a buffer from an entry protocol through successive
//! decoders until a decoder fails, no decoder is registered for the next id,
//! the finished sentinel is reached, the buffer runs out, or the depth guard
//! fires. Each invocation owns a fresh [`DecodeContext`]; embedded packets
//! get their own invocation with an independent depth budget.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, trace};

use crate::config::{ConfigError, PipelineConfig};
use crate::context::{DecodeContext, DecodeOutput, DecodeStatus, EmbeddedDecode, LayerRecord};
use crate::decoder::RawView;
use crate::event::{EventKind, EventSink};
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;
use crate::registry::DecoderRegistry;

/// Why an invocation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Next protocol has no registered decoder. Not an error.
    NoDecoderForProtocol,
    /// A decoder declared the payload finished.
    SentinelReached,
    DecodeFailed,
    DepthExceeded,
    /// Every byte was consumed but another protocol was expected.
    BufferExhausted,
    /// A decoder reported success with an impossible layer length.
    ContractViolation,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::NoDecoderForProtocol => "no_decoder_for_protocol",
            Termination::SentinelReached => "sentinel_reached",
            Termination::DecodeFailed => "decode_failed",
            Termination::DepthExceeded => "depth_exceeded",
            Termination::BufferExhausted => "buffer_exhausted",
            Termination::ContractViolation => "contract_violation",
        }
    }

    pub fn status(self) -> DecodeStatus {
        match self {
            Termination::NoDecoderForProtocol | Termination::SentinelReached => {
                DecodeStatus::Complete
            }
            Termination::DecodeFailed
            | Termination::BufferExhausted
            | Termination::ContractViolation => DecodeStatus::Partial,
            Termination::DepthExceeded => DecodeStatus::Suspicious,
        }
    }
}

/// Final state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub termination: Termination,
    pub flags: ProtoFlags,
    pub layer_count: usize,
    /// Protocol id the loop stopped on.
    pub final_protocol: ProtocolId,
    /// Bytes covered by decoded layers.
    pub consumed: usize,
    /// Events delivered by this invocation, embedded decodes excluded.
    pub events: usize,
}

/// Summary plus decoded fields for one packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketDecode {
    pub summary: DecodeSummary,
    pub output: DecodeOutput,
}

/// Registry plus limits; cheap to clone and share between workers.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use layerwalk_core::{
///     DecodePipeline, DecoderRegistry, ParserEvent, PipelineConfig, ProtocolId, Termination,
/// };
///
/// let registry = Arc::new(DecoderRegistry::builtin()?);
/// let pipeline = DecodePipeline::new(registry, PipelineConfig::default())?;
///
/// let mut events: Vec<ParserEvent> = Vec::new();
/// let frame = [0u8; 13];
/// let decoded = pipeline.decode(1, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);
/// assert_eq!(decoded.summary.termination, Termination::DecodeFailed);
/// assert_eq!(events.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct DecodePipeline {
    registry: Arc<DecoderRegistry>,
    config: PipelineConfig,
}

impl DecodePipeline {
    /// # Errors
    /// Returns `ConfigError` when a limit in `config` is out of range.
    pub fn new(registry: Arc<DecoderRegistry>, config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode one packet into a fresh output record.
    pub fn decode(
        &self,
        packet_id: u64,
        raw: &[u8],
        entry: ProtocolId,
        sink: &mut dyn EventSink,
    ) -> PacketDecode {
        let mut output = DecodeOutput::default();
        let summary = self.decode_into(packet_id, raw, entry, &mut output, sink);
        PacketDecode { summary, output }
    }

    /// Decode one packet into a caller-owned output record.
    pub fn decode_into(
        &self,
        packet_id: u64,
        raw: &[u8],
        entry: ProtocolId,
        out: &mut DecodeOutput,
        sink: &mut dyn EventSink,
    ) -> DecodeSummary {
        self.run(packet_id, 0, raw, entry, out, sink)
    }

    fn run(
        &self,
        packet_id: u64,
        nesting: usize,
        raw: &[u8],
        entry: ProtocolId,
        out: &mut DecodeOutput,
        sink: &mut dyn EventSink,
    ) -> DecodeSummary {
        let mut ctx = DecodeContext::nested(packet_id, nesting);
        let mut current = entry;
        let mut offset = 0usize;

        let termination = loop {
            if current == ProtocolId::FINISHED_DECODE {
                break Termination::SentinelReached;
            }
            ctx.begin_layer(current);
            if ctx.layer_count() >= self.config.max_decode_depth {
                ctx.emit(EventKind::DepthExceeded);
                flush(&mut ctx, sink);
                break Termination::DepthExceeded;
            }
            let Some(decoder) = self.registry.lookup(current) else {
                break Termination::NoDecoderForProtocol;
            };

            let view = RawView::new(raw.get(offset..).unwrap_or_default());
            let ok = decoder.decode(view, &mut ctx, out);
            if !ok && ctx.pending_events().is_empty() {
                error!(
                    packet = packet_id,
                    decoder = decoder.name(),
                    layer = ctx.layer_count(),
                    "decoder failed without reporting an event"
                );
            }
            flush(&mut ctx, sink);
            if !ok {
                break Termination::DecodeFailed;
            }

            let length = ctx.layer_length;
            if length == 0 || length > view.len() {
                error!(
                    packet = packet_id,
                    decoder = decoder.name(),
                    length,
                    available = view.len(),
                    "decoder violated layer length contract"
                );
                ctx.emit_lengths(EventKind::InternalLengthViolation, view.len(), length);
                flush(&mut ctx, sink);
                break Termination::ContractViolation;
            }

            out.layers.push(LayerRecord {
                protocol: current,
                decoder: decoder.name(),
                offset,
                length,
            });
            offset += length;
            current = ctx.next_protocol_id;
            ctx.complete_layer();

            if let Some(sentinel) = ctx.take_embedded_request() {
                self.decode_embedded(&mut ctx, raw, offset, sentinel, out, sink);
            }

            if offset == raw.len() && current != ProtocolId::FINISHED_DECODE {
                break Termination::BufferExhausted;
            }
        };

        out.status = termination.status();
        trace!(
            packet = packet_id,
            nesting,
            termination = termination.as_str(),
            layers = ctx.layer_count(),
            flags = %ctx.flags(),
            "decode finished"
        );
        DecodeSummary {
            termination,
            flags: ctx.flags(),
            layer_count: ctx.layer_count(),
            final_protocol: current,
            consumed: offset,
            events: ctx.events_emitted(),
        }
    }

    fn decode_embedded(
        &self,
        ctx: &mut DecodeContext,
        raw: &[u8],
        offset: usize,
        sentinel: ProtocolId,
        out: &mut DecodeOutput,
        sink: &mut dyn EventSink,
    ) {
        let Some(entry) = sentinel.embedded_entry() else {
            trace!(%sentinel, "ignoring request for unknown embedded entry");
            return;
        };
        let bytes = raw.get(offset..).unwrap_or_default();
        if !self.config.decode_embedded || bytes.is_empty() {
            return;
        }
        if ctx.nesting() >= self.config.max_embed_nesting {
            ctx.emit(EventKind::EmbedNestingLimit);
            flush(ctx, sink);
            return;
        }

        let mut inner = DecodeOutput::default();
        let summary = self.run(
            ctx.packet_id(),
            ctx.nesting() + 1,
            bytes,
            entry,
            &mut inner,
            sink,
        );
        out.embedded = Some(Box::new(EmbeddedDecode {
            entry: sentinel,
            offset,
            summary,
            output: inner,
        }));
    }
}

fn flush(ctx: &mut DecodeContext, sink: &mut dyn EventSink) {
    for event in ctx.drain_events() {
        sink.emit(event);
    }
}
