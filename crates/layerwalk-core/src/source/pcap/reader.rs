//! Capture-format conventions: magic detection, interface linktypes,
//! timestamps, and the protocol a frame of a given linktype starts with.

use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;
use crate::protocol_id::ProtocolId;

/// Read the first four bytes and rewind to the start.
///
/// # Errors
/// Returns `PcapSourceError::Io` when fewer than four bytes are available or
/// the reader cannot seek.
pub fn sniff_magic<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng(magic: &[u8; 4]) -> bool {
    *magic == layout::PCAPNG_MAGIC
}

/// Linktype and timestamp scale of one PCAPNG interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgInterface {
    pub linktype: Linktype,
    /// Timestamp ticks per second, from `if_tsresol`.
    pub resolution: u64,
    /// Seconds added to every timestamp, from `if_tsoffset`.
    pub offset: i64,
}

impl NgInterface {
    pub fn new(linktype: Linktype, resolution: Option<u64>, offset: i64) -> Self {
        Self {
            linktype,
            resolution: resolution
                .filter(|units| *units > 0)
                .unwrap_or(layout::MICROS_PER_SECOND),
            offset,
        }
    }
}

impl Default for NgInterface {
    fn default() -> Self {
        Self::new(Linktype::ETHERNET, None, 0)
    }
}

/// Interface a PCAPNG block refers to; undeclared interfaces are treated as
/// Ethernet with microsecond timestamps.
pub fn interface_for(interfaces: &[NgInterface], if_id: u32) -> NgInterface {
    usize::try_from(if_id)
        .ok()
        .and_then(|index| interfaces.get(index))
        .copied()
        .unwrap_or_default()
}

/// Legacy record timestamp; the fraction is in nanoseconds for captures
/// written with the nanosecond magic, microseconds otherwise.
pub fn legacy_ts_seconds(ts_sec: u32, ts_fraction: u32, nanosecond: bool) -> f64 {
    let per_second = if nanosecond {
        layout::NANOS_PER_SECOND
    } else {
        layout::MICROS_PER_SECOND
    };
    f64::from(ts_sec) + f64::from(ts_fraction) / per_second as f64
}

pub fn pcapng_ts_seconds(ts_high: u32, ts_low: u32, interface: &NgInterface) -> f64 {
    let ticks = (u64::from(ts_high) << 32) | u64::from(ts_low);
    let whole = ticks / interface.resolution;
    let fraction = ticks % interface.resolution;
    interface.offset as f64 + whole as f64 + fraction as f64 / interface.resolution as f64
}

/// Protocol the first header of a frame is dispatched as.
///
/// Ethernet frames enter through the bridging decoder. Raw IP frames are
/// dispatched by the version nibble of their first byte. Other linktypes
/// have no entry and are counted as unsupported.
pub fn entry_for_linktype(linktype: Linktype, data: &[u8]) -> Option<ProtocolId> {
    if linktype == Linktype::ETHERNET {
        return Some(ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING);
    }
    if linktype == Linktype::IPV4 {
        return Some(ProtocolId::ETHERTYPE_IPV4);
    }
    if linktype == Linktype::IPV6 {
        return Some(ProtocolId::ETHERTYPE_IPV6);
    }
    if linktype == Linktype::RAW {
        return match data.first().map(|byte| byte >> layout::IP_VERSION_SHIFT) {
            Some(4) => Some(ProtocolId::ETHERTYPE_IPV4),
            Some(6) => Some(ProtocolId::ETHERTYPE_IPV6),
            _ => None,
        };
    }
    None
}
