use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compute::DevicePreference;
use crate::error::{AlignError, Result};
use crate::flow::FlowParams;
use crate::io::crop::CropCorners;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    /// `.ser` movie or `.toml` sequence manifest.
    pub input: PathBuf,
    /// Composite image; TIFF unless the extension is `.png`.
    #[serde(default)]
    pub composite: Option<PathBuf>,
    /// Aligned 16-bit SER movie. Requires `group_size = 1`.
    #[serde(default)]
    pub aligned_movie: Option<PathBuf>,
    /// TOML table of flow consistency records.
    #[serde(default)]
    pub records: Option<PathBuf>,
    #[serde(default)]
    pub crop: Option<CropCorners>,
    #[serde(default)]
    pub frame_range: Option<FrameRange>,
    /// Group size at which the coarse-to-fine schedule stops.
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default)]
    pub flow: FlowParams,
    #[serde(default)]
    pub dark: Option<PathBuf>,
    #[serde(default)]
    pub gain: Option<PathBuf>,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_group_size() -> usize {
    1
}

/// Inclusive frame range, 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub first: usize,
    pub last: usize,
}

impl FrameRange {
    /// The same range in the sequence's 1-based indexing.
    pub fn to_one_based(self) -> Result<(usize, usize)> {
        if self.last < self.first {
            return Err(AlignError::InvalidConfig(format!(
                "frame range {}-{} is reversed",
                self.first, self.last
            )));
        }
        Ok((self.first + 1, self.last + 1))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Spill warm-start fields to record files here instead of memory.
    #[serde(default)]
    pub spill_dir: Option<PathBuf>,
}

impl AlignConfig {
    /// Defaults for everything but the input.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            composite: None,
            aligned_movie: None,
            records: None,
            crop: None,
            frame_range: None,
            group_size: default_group_size(),
            flow: FlowParams::default(),
            dark: None,
            gain: None,
            device: DevicePreference::default(),
            cache: CacheConfig::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| AlignError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AlignError::InvalidConfig(e.to_string()))
    }
}
