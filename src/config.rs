//! Engine limits, loadable from TOML.
//!
//! ```toml
//! max_headers = 32
//! encode_capacity = 9000
//! ```

use crate::codec::CodecError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Most headers one decode pass may produce.
    pub max_headers: usize,
    /// Initial buffer capacity for encode.
    pub encode_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            max_headers: 64,
            encode_capacity: 1514,
        }
    }
}

impl CodecConfig {
    pub fn from_toml(content: &str) -> Result<Self, CodecError> {
        let config: CodecConfig = toml::from_str(content)
            .map_err(|e| CodecError::Config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CodecError::Config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if self.max_headers == 0 {
            return Err(CodecError::Config("max_headers must be at least 1".to_string()));
        }
        Ok(())
    }
}
