//! Graph geometry configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Chunk geometry shared by every layer of the hierarchy.
///
/// ```json
/// { "fanout": 2, "chunk_size": [512, 512, 64], "bounds": [4096, 4096, 1024] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Chunks per axis merged into one parent chunk.
    pub fanout: u32,
    /// Base-layer chunk extent in voxels, per axis.
    pub chunk_size: Vec<u64>,
    /// Dataset extent in voxels. Without it the hierarchy is unbounded.
    pub bounds: Option<Vec<u64>>,
    /// Overrides the layer count derived from `bounds`.
    pub layer_count: Option<u8>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            fanout: 2,
            chunk_size: vec![512, 512, 64],
            bounds: None,
            layer_count: None,
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GraphConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fanout == 0 {
            return Err(Error::Config("fanout must be at least 1".into()));
        }
        if self.chunk_size.is_empty() || self.chunk_size.contains(&0) {
            return Err(Error::Config("chunk_size needs a non-zero extent per axis".into()));
        }
        if let Some(bounds) = &self.bounds {
            if bounds.len() != self.chunk_size.len() {
                return Err(Error::Config(format!(
                    "bounds has {} axes, chunk_size has {}",
                    bounds.len(),
                    self.chunk_size.len()
                )));
            }
        }
        if let Some(layers) = self.layer_count {
            if layers < 2 {
                return Err(Error::Config("layer_count must be at least 2".into()));
            }
        }
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.chunk_size.len()
    }
}
