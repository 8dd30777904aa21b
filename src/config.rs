//! Bridge configuration
//!
//! Read once at startup; the running bridge never reconfigures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::format::AudioFormat;
use crate::relay::DEFAULT_CHUNK_SIZE;

/// Endpoints used when none are given
pub const DEFAULT_ENDPOINTS: [&str; 2] = ["/dev/dsp", "/dev/dsp4"];

/// Everything needed to bring up a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// The two devices to bridge, A then B
    pub endpoints: [PathBuf; 2],
    /// Format applied to every handle in both directions
    pub format: AudioFormat,
    /// Bytes moved per relay step
    pub chunk_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            endpoints: DEFAULT_ENDPOINTS.map(PathBuf::from),
            format: AudioFormat::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn new(endpoint_a: impl Into<PathBuf>, endpoint_b: impl Into<PathBuf>) -> Self {
        BridgeConfig {
            endpoints: [endpoint_a.into(), endpoint_b.into()],
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Load a JSON configuration file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| BridgeError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| BridgeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn endpoint_a(&self) -> &Path {
        &self.endpoints[0]
    }

    pub fn endpoint_b(&self) -> &Path {
        &self.endpoints[1]
    }

    pub fn validate(&self) -> Result<()> {
        self.format
            .validate()
            .map_err(|reason| BridgeError::InvalidConfig { reason })?;

        if self.chunk_size == 0 {
            return Err(BridgeError::InvalidConfig {
                reason: "chunk size must be greater than 0".to_string(),
            });
        }

        if let Some(empty) = self.endpoints.iter().find(|p| p.as_os_str().is_empty()) {
            return Err(BridgeError::InvalidConfig {
                reason: format!("endpoint path is empty: {:?}", empty),
            });
        }

        Ok(())
    }
}
