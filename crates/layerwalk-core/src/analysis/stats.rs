use std::collections::BTreeMap;

use crate::context::DecodeOutput;
use crate::event::{EventKind, ParserEvent};
use crate::pipeline::PacketDecode;
use crate::{DecodeStats, EventSummary, PacketRecord};

/// Packet ids kept per event kind as examples.
const EVENT_EXAMPLES: usize = 5;

#[derive(Debug, Default)]
struct EventStats {
    count: u64,
    examples: Vec<u64>,
}

/// Folds decoded packets into report sections.
#[derive(Debug, Default)]
pub(super) struct DecodeAggregator {
    stats: DecodeStats,
    events: BTreeMap<EventKind, EventStats>,
    packets: Vec<PacketRecord>,
    keep_packets: bool,
}

impl DecodeAggregator {
    pub(super) fn new(keep_packets: bool) -> Self {
        Self {
            keep_packets,
            ..Self::default()
        }
    }

    pub(super) fn add(
        &mut self,
        packet_id: u64,
        ts: Option<String>,
        decode: &PacketDecode,
        events: &[ParserEvent],
    ) {
        let summary = &decode.summary;
        *self
            .stats
            .terminations
            .entry(summary.termination.as_str().to_string())
            .or_default() += 1;
        *self
            .stats
            .statuses
            .entry(decode.output.status.as_str().to_string())
            .or_default() += 1;
        self.stats.max_layers = self.stats.max_layers.max(summary.layer_count);
        self.count_layers(&decode.output);

        for event in events {
            let entry = self.events.entry(event.kind).or_default();
            entry.count += 1;
            if entry.examples.len() < EVENT_EXAMPLES && entry.examples.last() != Some(&event.packet_id)
            {
                entry.examples.push(event.packet_id);
            }
        }

        if self.keep_packets {
            self.packets.push(packet_record(packet_id, ts, decode, events));
        }
    }

    fn count_layers(&mut self, output: &DecodeOutput) {
        for layer in &output.layers {
            *self
                .stats
                .protocols
                .entry(layer.decoder.to_string())
                .or_default() += 1;
        }
        if let Some(embedded) = &output.embedded {
            self.stats.embedded_decodes += 1;
            self.count_layers(&embedded.output);
        }
    }

    pub(super) fn finish(self) -> (DecodeStats, Vec<EventSummary>, Vec<PacketRecord>) {
        let mut events: Vec<EventSummary> = self
            .events
            .into_iter()
            .map(|(kind, stats)| EventSummary {
                code: kind.code().to_string(),
                kind: event_kind_name(kind),
                severity: kind.severity().as_str().to_string(),
                message: kind.message().to_string(),
                count: stats.count,
                examples: stats.examples,
            })
            .collect();
        events.sort_by(|a, b| a.code.cmp(&b.code));
        (self.stats, events, self.packets)
    }
}

fn event_kind_name(kind: EventKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| kind.code().to_string())
}

fn layer_names(output: &DecodeOutput) -> Vec<String> {
    output
        .layers
        .iter()
        .map(|layer| layer.decoder.to_string())
        .collect()
}

fn packet_record(
    packet_id: u64,
    ts: Option<String>,
    decode: &PacketDecode,
    events: &[ParserEvent],
) -> PacketRecord {
    let summary = &decode.summary;
    PacketRecord {
        packet_id,
        ts,
        termination: summary.termination.as_str().to_string(),
        status: decode.output.status.as_str().to_string(),
        layers: layer_names(&decode.output),
        flags: summary
            .flags
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        final_protocol: summary.final_protocol.to_string(),
        embedded_layers: decode
            .output
            .embedded
            .as_ref()
            .map(|embedded| layer_names(&embedded.output))
            .unwrap_or_default(),
        events: events
            .iter()
            .map(|event| event.kind.code().to_string())
            .collect(),
    }
}
