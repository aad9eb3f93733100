//! Protocol-id to decoder map.
//!
//! Built once before any packet is decoded and read-only afterwards, so a
//! single `Arc<DecoderRegistry>` can be shared by every worker thread.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::codecs::BUILTIN_DECODERS;
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi};
use crate::protocol_id::ProtocolId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("protocol {id} claimed by both `{first}` and `{second}`")]
    Conflict {
        id: ProtocolId,
        first: &'static str,
        second: &'static str,
    },
    #[error("decoder `{decoder}` claims internal id {id}")]
    SentinelClaim {
        decoder: &'static str,
        id: ProtocolId,
    },
    #[error("decoder `{decoder}` built for API version {found}, expected {expected}")]
    ApiVersion {
        decoder: &'static str,
        found: u32,
        expected: u32,
    },
    #[error("decoder `{decoder}` claims no protocol ids")]
    NoProtocols { decoder: &'static str },
}

pub struct DecoderRegistry {
    decoders: Vec<Box<dyn Decoder>>,
    by_id: HashMap<ProtocolId, usize>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field(
                "decoders",
                &self.decoders.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("protocols", &self.by_id.len())
            .finish()
    }
}

impl DecoderRegistry {
    /// Build a registry from decoder instances.
    ///
    /// # Errors
    /// Fails when two decoders claim the same id, a decoder claims a sentinel
    /// id, or a decoder claims nothing.
    pub fn build(decoders: Vec<Box<dyn Decoder>>) -> Result<Self, RegistryError> {
        let mut by_id: HashMap<ProtocolId, usize> = HashMap::new();
        for (index, decoder) in decoders.iter().enumerate() {
            let ids = decoder.protocol_ids();
            if ids.is_empty() {
                return Err(RegistryError::NoProtocols {
                    decoder: decoder.name(),
                });
            }
            for &id in ids {
                if id.is_sentinel() {
                    return Err(RegistryError::SentinelClaim {
                        decoder: decoder.name(),
                        id,
                    });
                }
                if let Some(&existing) = by_id.get(&id) {
                    return Err(RegistryError::Conflict {
                        id,
                        first: decoders[existing].name(),
                        second: decoder.name(),
                    });
                }
                by_id.insert(id, index);
                debug!(decoder = decoder.name(), %id, "registered protocol");
            }
        }

        info!(
            decoders = decoders.len(),
            protocols = by_id.len(),
            "decoder registry built"
        );
        Ok(Self { decoders, by_id })
    }

    /// Build from plugin descriptors, checking each interface version first.
    pub fn from_apis(apis: &[DecoderApi]) -> Result<Self, RegistryError> {
        let mut decoders = Vec::with_capacity(apis.len());
        for api in apis {
            if api.version != DECODER_API_VERSION {
                return Err(RegistryError::ApiVersion {
                    decoder: api.name,
                    found: api.version,
                    expected: DECODER_API_VERSION,
                });
            }
            decoders.push((api.ctor)());
        }
        Self::build(decoders)
    }

    /// Registry with every builtin decoder.
    ///
    /// # Examples
    /// ```
    /// use layerwalk_core::{DecoderRegistry, ProtocolId};
    ///
    /// let registry = DecoderRegistry::builtin()?;
    /// let decoder = registry.lookup(ProtocolId::ETHERTYPE_IPV4).unwrap();
    /// assert_eq!(decoder.name(), "ipv4");
    /// assert!(registry.lookup(ProtocolId::FINISHED_DECODE).is_none());
    /// # Ok::<(), layerwalk_core::RegistryError>(())
    /// ```
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_apis(BUILTIN_DECODERS)
    }

    pub fn lookup(&self, id: ProtocolId) -> Option<&dyn Decoder> {
        self.by_id
            .get(&id)
            .and_then(|&index| self.decoders.get(index))
            .map(|decoder| decoder.as_ref())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn decoders(&self) -> impl Iterator<Item = &dyn Decoder> {
        self.decoders.iter().map(|decoder| decoder.as_ref())
    }

    /// Claimed ids in ascending order with the owning decoder's name.
    pub fn protocols(&self) -> Vec<(ProtocolId, &'static str)> {
        let mut protocols: Vec<_> = self
            .by_id
            .iter()
            .filter_map(|(&id, &index)| self.decoders.get(index).map(|d| (id, d.name())))
            .collect();
        protocols.sort_unstable_by_key(|(id, _)| *id);
        protocols
    }

    pub fn thread_init(&self) {
        for decoder in &self.decoders {
            decoder.thread_init();
        }
    }

    pub fn thread_term(&self) {
        for decoder in &self.decoders {
            decoder.thread_term();
        }
    }
}
