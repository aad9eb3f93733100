use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info};

use crate::config::{ConfigError, PipelineConfig};
use crate::event::{EventSink, ParserEvent, TracingSink};
use crate::pipeline::DecodePipeline;
use crate::registry::{DecoderRegistry, RegistryError};
use crate::source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
use crate::worker::{PacketJob, decode_batch};
use crate::{CaptureSummary, DEFAULT_GENERATED_AT, Report, make_stub_report};

mod stats;

use stats::DecodeAggregator;

/// Packets read from the source per worker before a batch is decoded.
const BATCH_PACKETS_PER_WORKER: usize = 256;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub config: PipelineConfig,
    /// Decoding threads; 1 decodes on the calling thread.
    pub workers: usize,
    /// Keep one record per packet in the report.
    pub include_packets: bool,
    /// Forward every parser event to `tracing`.
    pub log_events: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            workers: 1,
            include_packets: false,
            log_events: false,
        }
    }
}

/// Decode every packet of a PCAP or PCAPNG file with the builtin decoders.
///
/// # Errors
/// Returns `AnalysisError` when the file cannot be read, the configuration
/// is invalid, or the builtin registry fails to build.
pub fn decode_pcap_file(path: &Path, options: &AnalysisOptions) -> Result<Report, AnalysisError> {
    let source = PcapFileSource::open(path)?;
    let registry = Arc::new(DecoderRegistry::builtin()?);
    let pipeline = DecodePipeline::new(registry, options.config)?;
    let mut report = decode_source(&pipeline, source, options)?;
    report.input.path = path.display().to_string();
    report.input.bytes = path.metadata()?.len();
    Ok(report)
}

/// Decode every packet of `source` with an existing pipeline.
///
/// Packets whose link type has no entry protocol are counted but not
/// decoded. Packet ids are assigned from 1 in source order.
pub fn decode_source<S: PacketSource>(
    pipeline: &DecodePipeline,
    mut source: S,
    options: &AnalysisOptions,
) -> Result<Report, AnalysisError> {
    let batch_size = options.workers.max(1) * BATCH_PACKETS_PER_WORKER;
    let mut aggregator = DecodeAggregator::new(options.include_packets);
    let mut counts = PacketCounts::default();
    let mut first_ts = None;
    let mut last_ts = None;
    let mut batch: Vec<(PacketJob, Option<f64>)> = Vec::with_capacity(batch_size);

    while let Some(PacketEvent { ts, linktype, data }) = source.next_packet()? {
        counts.total += 1;
        update_ts_bounds(&mut first_ts, &mut last_ts, ts);
        let Some(entry) = crate::source::entry_for_linktype(linktype, &data) else {
            counts.unsupported += 1;
            debug!(packet = counts.total, linktype = linktype.0, "unsupported link type");
            continue;
        };
        batch.push((
            PacketJob {
                packet_id: counts.total,
                entry,
                data,
            },
            ts,
        ));
        if batch.len() >= batch_size {
            flush_batch(pipeline, &mut batch, options, &mut aggregator, &mut counts);
        }
    }
    flush_batch(pipeline, &mut batch, options, &mut aggregator, &mut counts);

    let (decode, events, packets) = aggregator.finish();
    info!(
        packets = counts.total,
        decoded = counts.decoded,
        unsupported = counts.unsupported,
        "capture decoded"
    );

    let mut report = make_stub_report("-", 0);
    report.capture_summary = Some(CaptureSummary {
        packets_total: counts.total,
        packets_decoded: counts.decoded,
        packets_unsupported: counts.unsupported,
        time_start: ts_to_rfc3339(first_ts),
        time_end: ts_to_rfc3339(last_ts),
    });
    report.generated_at = report
        .capture_summary
        .as_ref()
        .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.decode = decode;
    report.events = events;
    report.packets = packets;
    Ok(report)
}

#[derive(Debug, Default)]
struct PacketCounts {
    total: u64,
    decoded: u64,
    unsupported: u64,
}

fn flush_batch(
    pipeline: &DecodePipeline,
    batch: &mut Vec<(PacketJob, Option<f64>)>,
    options: &AnalysisOptions,
    aggregator: &mut DecodeAggregator,
    counts: &mut PacketCounts,
) {
    if batch.is_empty() {
        return;
    }
    let (jobs, timestamps): (Vec<PacketJob>, Vec<Option<f64>>) = batch.drain(..).unzip();
    let results = decode_batch(pipeline, jobs, options.workers);
    let mut sink = TracingSink;
    for (result, ts) in results.into_iter().zip(timestamps) {
        counts.decoded += 1;
        if options.log_events {
            forward(&mut sink, &result.events);
        }
        let ts = if options.include_packets {
            ts_to_rfc3339(ts)
        } else {
            None
        };
        aggregator.add(result.packet_id, ts, &result.decode, &result.events);
    }
}

fn forward(sink: &mut dyn EventSink, events: &[ParserEvent]) {
    for event in events {
        sink.emit(event.clone());
    }
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let Some(ts) = ts else {
        return;
    };
    if first.is_none_or(|existing| ts < existing) {
        *first = Some(ts);
    }
    if last.is_none_or(|existing| ts > existing) {
        *last = Some(ts);
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let nanos = (ts? * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pcap_parser::Linktype;

    use super::{AnalysisOptions, decode_source, ts_to_rfc3339, update_ts_bounds};
    use crate::config::PipelineConfig;
    use crate::pipeline::DecodePipeline;
    use crate::registry::DecoderRegistry;
    use crate::source::{MemorySource, PacketEvent};

    fn pipeline() -> DecodePipeline {
        let registry = Arc::new(DecoderRegistry::builtin().unwrap());
        DecodePipeline::new(registry, PipelineConfig::default()).unwrap()
    }

    #[test]
    fn ts_bounds_track_min_and_max() {
        let (mut first, mut last) = (None, None);
        for ts in [Some(5.0), None, Some(2.0), Some(9.5)] {
            update_ts_bounds(&mut first, &mut last, ts);
        }
        assert_eq!(first, Some(2.0));
        assert_eq!(last, Some(9.5));
    }

    #[test]
    fn ts_formats_as_rfc3339() {
        assert_eq!(
            ts_to_rfc3339(Some(1.5)).as_deref(),
            Some("1970-01-01T00:00:01.5Z")
        );
        assert_eq!(ts_to_rfc3339(None), None);
    }

    #[test]
    fn unsupported_linktypes_are_counted() {
        let source = MemorySource::new([
            PacketEvent {
                ts: Some(10.0),
                linktype: Linktype::NULL,
                data: vec![2, 0, 0, 0],
            },
            PacketEvent {
                ts: Some(11.0),
                linktype: Linktype::ETHERNET,
                data: vec![0u8; 8],
            },
        ]);
        let report = decode_source(&pipeline(), source, &AnalysisOptions::default()).unwrap();
        let summary = report.capture_summary.unwrap();
        assert_eq!(summary.packets_total, 2);
        assert_eq!(summary.packets_decoded, 1);
        assert_eq!(summary.packets_unsupported, 1);
        assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:00:10Z"));
        assert_eq!(report.generated_at, "1970-01-01T00:00:11Z");
        assert_eq!(report.events.len(), 1);
        assert!(report.packets.is_empty());
    }

    #[test]
    fn worker_count_does_not_change_report() {
        let frames: Vec<Vec<u8>> = (0..50u8).map(|n| vec![n; 14 + usize::from(n)]).collect();
        let serial = decode_source(
            &pipeline(),
            MemorySource::ethernet(frames.clone()),
            &AnalysisOptions {
                include_packets: true,
                ..AnalysisOptions::default()
            },
        )
        .unwrap();
        let parallel = decode_source(
            &pipeline(),
            MemorySource::ethernet(frames),
            &AnalysisOptions {
                include_packets: true,
                workers: 4,
                ..AnalysisOptions::default()
            },
        )
        .unwrap();
        assert_eq!(serial.decode, parallel.decode);
        assert_eq!(serial.events, parallel.events);
        assert_eq!(serial.packets, parallel.packets);
    }
}
