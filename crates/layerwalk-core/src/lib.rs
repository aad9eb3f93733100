//! Layerwalk core: nested protocol decoding for intrusion detection.
//!
//! A packet is decoded as a chain of layers. Starting from an entry protocol
//! id, the pipeline looks up the registered decoder for the current id, lets
//! it parse exactly one header, and dispatches to the id the decoder names
//! next. Decoders validate their headers against bounds-checked readers,
//! record what they saw in a [`DecodeOutput`] and a monotonic
//! [`ProtoFlags`] set, and report malformed layers as [`ParserEvent`]s.
//!
//! Invariants:
//! - Every successful layer consumes at least one byte and never more than
//!   it was given.
//! - One invocation decodes at most `max_decode_depth` layers.
//! - Embedded packets are decoded by a separate invocation with its own
//!   depth budget, bounded by `max_embed_nesting`.
//! - Per-packet failures surface as a [`DecodeSummary`] plus events, never as
//!   a panic or an `Err`.
//!
//! The `source` and `analysis` modules wrap the pipeline for offline use:
//! capture files in, a deterministic [`Report`] out.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use layerwalk_core::{AnalysisOptions, decode_pcap_file};
//!
//! let report = decode_pcap_file(Path::new("capture.pcapng"), &AnalysisOptions::default())?;
//! println!("decoded {} packets", report.capture_summary.map_or(0, |s| s.packets_decoded));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod analysis;
pub mod codecs;
mod config;
mod context;
mod decoder;
mod event;
mod flags;
mod pipeline;
mod protocol_id;
mod registry;
pub mod source;
mod worker;

pub use analysis::{AnalysisError, AnalysisOptions, decode_pcap_file, decode_source};
pub use codecs::BUILTIN_DECODERS;
pub use config::{
    ConfigError, DEFAULT_MAX_DECODE_DEPTH, DEFAULT_MAX_EMBED_NESTING, MAX_DECODE_DEPTH_LIMIT,
    MAX_EMBED_NESTING_LIMIT, PipelineConfig,
};
pub use context::{
    DecodeContext, DecodeOutput, DecodeStatus, EmbeddedDecode, EthernetAddrs, IcmpInfo,
    IpEndpoints, LayerRecord, TransportPorts,
};
pub use decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
pub use event::{CountingSink, EventKind, EventSink, ParserEvent, Severity, TracingSink};
pub use flags::ProtoFlags;
pub use pipeline::{DecodePipeline, DecodeSummary, PacketDecode, Termination};
pub use protocol_id::{IdRange, ProtocolId, is_extension_header};
pub use registry::{DecoderRegistry, RegistryError};
pub use source::{
    MemorySource, PacketEvent, PacketSource, PcapFileSource, SourceError, entry_for_linktype,
};
pub use worker::{DecodeWorker, JobResult, PacketJob, WorkerStats, decode_batch};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Decode report for one capture, with deterministic ordering.
///
/// # Examples
/// ```
/// use layerwalk_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, layerwalk_core::REPORT_VERSION);
/// assert!(report.events.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp; the last capture timestamp when one is known.
    pub generated_at: String,
    pub input: InputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    pub decode: DecodeStats,
    /// Event counts ordered by event code.
    pub events: Vec<EventSummary>,
    /// Per-packet records, only when requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packets: Vec<PacketRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub packets_total: u64,
    /// Packets with a supported link type that went through the pipeline.
    pub packets_decoded: u64,
    pub packets_unsupported: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Aggregate pipeline results. Map keys are stable names, so the
/// `BTreeMap`s serialize in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Packets per termination reason of the outer invocation.
    pub terminations: BTreeMap<String, u64>,
    /// Packets per decode status.
    pub statuses: BTreeMap<String, u64>,
    /// Decoded layers per decoder, embedded layers included.
    pub protocols: BTreeMap<String, u64>,
    /// Deepest outer layer chain seen.
    pub max_layers: usize,
    pub embedded_decodes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub code: String,
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub count: u64,
    /// First few packet ids that produced the event.
    pub examples: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub packet_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub termination: String,
    pub status: String,
    /// Decoder name per layer, outermost first.
    pub layers: Vec<String>,
    pub flags: Vec<String>,
    pub final_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded_layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

/// Empty report for `input_path`, filled in by the analysis layer.
///
/// # Examples
/// ```
/// use layerwalk_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcap", 24);
/// assert_eq!(report.tool.name, "layerwalk");
/// assert_eq!(report.input.bytes, 24);
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "layerwalk".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        decode: DecodeStats::default(),
        events: Vec::new(),
        packets: Vec::new(),
    }
}
