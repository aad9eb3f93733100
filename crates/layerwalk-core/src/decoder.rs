//! Decoder contract and plugin descriptor.

use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::protocol_id::ProtocolId;

/// Interface version a decoder descriptor must carry to be registered.
pub const DECODER_API_VERSION: u32 = 0;

/// Borrowed view of the bytes not yet consumed by earlier layers.
///
/// The lifetime ties the view to one decode call; a decoder cannot store it.
#[derive(Debug, Clone, Copy)]
pub struct RawView<'a> {
    bytes: &'a [u8],
}

impl<'a> RawView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub(crate) fn reader(&self) -> ByteReader<'a> {
        ByteReader::new(self.bytes)
    }
}

/// A decoder for one layer of one or more protocols.
///
/// Implementations are shared read-only between threads. On success `decode`
/// returns `true` after setting `ctx.layer_length` (non-zero and within the
/// view) and `ctx.next_protocol_id`. On failure it returns `false` after
/// emitting exactly one event through the context.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str {
        ""
    }

    /// Protocol ids this decoder is dispatched for. Called once at registry
    /// build.
    fn protocol_ids(&self) -> &[ProtocolId];

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool;

    /// Called once on every worker thread before it decodes packets.
    fn thread_init(&self) {}

    /// Called once on every worker thread when it stops.
    fn thread_term(&self) {}
}

/// Registration record for a decoder implementation.
///
/// # Examples
/// ```
/// use layerwalk_core::{BUILTIN_DECODERS, DECODER_API_VERSION};
///
/// let api = BUILTIN_DECODERS
///     .iter()
///     .find(|api| api.name == "trans_bridge")
///     .unwrap();
/// assert_eq!(api.version, DECODER_API_VERSION);
/// let decoder = (api.ctor)();
/// assert_eq!(decoder.name(), "trans_bridge");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DecoderApi {
    pub name: &'static str,
    pub help: &'static str,
    pub version: u32,
    pub ctor: fn() -> Box<dyn Decoder>,
}
