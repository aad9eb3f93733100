//! Packet sources feeding the decode pipeline.

pub mod pcap;

pub use pcap::PcapFileSource;
pub use pcap::reader::entry_for_linktype;

use pcap_parser::Linktype;
use thiserror::Error;

use crate::protocol_id::ProtocolId;

/// One captured frame.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture timestamp in seconds since the epoch, when recorded.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

impl PacketEvent {
    /// Protocol the pipeline should start this frame with.
    pub fn entry_protocol(&self) -> Option<ProtocolId> {
        entry_for_linktype(self.linktype, &self.data)
    }
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

/// Frames held in memory, yielded in order.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    packets: std::collections::VecDeque<PacketEvent>,
}

impl MemorySource {
    pub fn new(packets: impl IntoIterator<Item = PacketEvent>) -> Self {
        Self {
            packets: packets.into_iter().collect(),
        }
    }

    /// Ethernet frames without timestamps.
    pub fn ethernet(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self::new(frames.into_iter().map(|data| PacketEvent {
            ts: None,
            linktype: Linktype::ETHERNET,
            data,
        }))
    }
}

impl PacketSource for MemorySource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        Ok(self.packets.pop_front())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
