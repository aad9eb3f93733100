use std::fs::File;
use std::path::Path;

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader};
use tracing::debug;

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    NgInterface, interface_for, is_pcapng, legacy_ts_seconds, pcapng_ts_seconds, sniff_magic,
};

/// Packet source over a legacy PCAP or PCAPNG file, chosen by magic.
pub struct PcapFileSource {
    format: Format,
}

enum Format {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Linktype,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: Vec<NgInterface>,
    },
}

impl PcapFileSource {
    /// # Errors
    /// Returns `SourceError` when the file cannot be opened or its header is
    /// not a capture header.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut file = File::open(path)?;
        let magic = sniff_magic(&mut file)?;
        let format = if is_pcapng(&magic) {
            let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcapng reader init", e))?;
            Format::Ng {
                reader,
                interfaces: Vec::new(),
            }
        } else {
            let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcap reader init", e))?;
            Format::Legacy {
                reader,
                linktype: Linktype::ETHERNET,
                nanosecond: false,
            }
        };
        debug!(path = %path.display(), pcapng = is_pcapng(&magic), "opened capture");
        Ok(Self { format })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        let next = match &mut self.format {
            Format::Legacy {
                reader,
                linktype,
                nanosecond,
            } => next_legacy(reader, linktype, nanosecond),
            Format::Ng { reader, interfaces } => next_ng(reader, interfaces),
        };
        next.map_err(SourceError::from)
    }
}

fn next_legacy(
    reader: &mut LegacyPcapReader<File>,
    linktype: &mut Linktype,
    nanosecond: &mut bool,
) -> Result<Option<PacketEvent>, PcapSourceError> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        *linktype = header.network;
                        *nanosecond = header.is_nanosecond_precision();
                        None
                    }
                    PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                        ts: Some(legacy_ts_seconds(packet.ts_sec, packet.ts_usec, *nanosecond)),
                        linktype: *linktype,
                        data: packet.data.to_vec(),
                    }),
                    PcapBlockOwned::NG(_) => None,
                };
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => reader
                .refill()
                .map_err(|e| PcapSourceError::pcap("pcap refill", e))?,
            Err(e) => return Err(PcapSourceError::pcap("pcap block", e)),
        }
    }
}

fn next_ng(
    reader: &mut PcapNGReader<File>,
    interfaces: &mut Vec<NgInterface>,
) -> Result<Option<PacketEvent>, PcapSourceError> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                        // Interface ids restart in every section.
                        interfaces.clear();
                        None
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(interface)) => {
                        interfaces.push(NgInterface::new(
                            interface.linktype,
                            interface.ts_resolution(),
                            interface.ts_offset(),
                        ));
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                        let interface = interface_for(interfaces, packet.if_id);
                        Some(PacketEvent {
                            ts: Some(pcapng_ts_seconds(packet.ts_high, packet.ts_low, &interface)),
                            linktype: interface.linktype,
                            data: packet.data.to_vec(),
                        })
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(packet)) => Some(PacketEvent {
                        ts: None,
                        linktype: interface_for(interfaces, 0).linktype,
                        data: packet.data.to_vec(),
                    }),
                    _ => None,
                };
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => reader
                .refill()
                .map_err(|e| PcapSourceError::pcap("pcapng refill", e))?,
            Err(e) => return Err(PcapSourceError::pcap("pcapng block", e)),
        }
    }
}
