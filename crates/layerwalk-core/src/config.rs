//! Pipeline limits.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Values are validated once, when the pipeline is built.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_DECODE_DEPTH: usize = 32;
pub const MAX_DECODE_DEPTH_LIMIT: usize = 255;
pub const DEFAULT_MAX_EMBED_NESTING: usize = 1;
pub const MAX_EMBED_NESTING_LIMIT: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_decode_depth must be within 1..={MAX_DECODE_DEPTH_LIMIT}, got {0}")]
    DecodeDepth(usize),
    #[error("max_embed_nesting must be within 0..={MAX_EMBED_NESTING_LIMIT}, got {0}")]
    EmbedNesting(usize),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bounds applied to every pipeline invocation.
///
/// # Examples
/// ```
/// use layerwalk_core::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(r#"{ "max_decode_depth": 8 }"#)?;
/// assert_eq!(config.max_decode_depth, 8);
/// assert_eq!(config.max_embed_nesting, 1);
/// # Ok::<(), layerwalk_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Layers one invocation may decode before the depth guard fires.
    pub max_decode_depth: usize,
    /// Embedded decodes allowed inside one another.
    pub max_embed_nesting: usize,
    /// Whether embedded-packet requests from decoders are honoured at all.
    pub decode_embedded: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_decode_depth: DEFAULT_MAX_DECODE_DEPTH,
            max_embed_nesting: DEFAULT_MAX_EMBED_NESTING,
            decode_embedded: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DECODE_DEPTH_LIMIT).contains(&self.max_decode_depth) {
            return Err(ConfigError::DecodeDepth(self.max_decode_depth));
        }
        if self.max_embed_nesting > MAX_EMBED_NESTING_LIMIT {
            return Err(ConfigError::EmbedNesting(self.max_embed_nesting));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed JSON or unknown keys, and the
    /// range variants when a limit is out of bounds.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_MAX_DECODE_DEPTH, PipelineConfig};

    #[test]
    fn empty_object_gives_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.max_decode_depth, DEFAULT_MAX_DECODE_DEPTH);
        assert!(config.decode_embedded);
    }

    #[test]
    fn rejects_zero_depth() {
        let err = PipelineConfig::default()
            .with_max_decode_depth(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DecodeDepth(0)));
    }

    #[test]
    fn rejects_depth_above_limit() {
        let err = PipelineConfig::from_json_str(r#"{"max_decode_depth": 256}"#).unwrap_err();
        assert!(matches!(err, ConfigError::DecodeDepth(256)));
    }

    #[test]
    fn rejects_deep_embed_nesting() {
        let err = PipelineConfig::from_json_str(r#"{"max_embed_nesting": 5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmbedNesting(5)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = PipelineConfig::from_json_str(r#"{"max_depth": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
