// SPDX-License-Identifier: MIT OR Apache-2.0
//! Viewer configuration file.

use nodeview_canvas::{LayoutConfig, NodeStyle, DEFAULT_SCENE_SIZE};
use nodeview_graph::NamePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Settings of a viewer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Format version
    pub version: u32,
    /// Node schema file, relative to the configuration file
    pub schema: PathBuf,
    /// Width and height of the canvas scene
    pub scene_size: [f32; 2],
    /// What happens when a node name is reused
    pub name_policy: NamePolicy,
    /// Lay out nodes after a scene is opened
    pub auto_layout: bool,
    /// Layout settings
    pub layout: LayoutConfig,
    /// Node colours
    pub style: NodeStyle,
    /// Maximum bus flushes while waiting for events to settle
    pub settle_limit: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            schema: PathBuf::from("schema.ron"),
            scene_size: [DEFAULT_SCENE_SIZE, DEFAULT_SCENE_SIZE],
            name_policy: NamePolicy::default(),
            auto_layout: true,
            layout: LayoutConfig::default(),
            style: NodeStyle::default(),
            settle_limit: 16,
        }
    }
}

impl ViewerConfig {
    /// Parse RON text
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;

        // Version check
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Schema path resolved against the directory holding the config file
    pub fn schema_path(&self, config_dir: &Path) -> PathBuf {
        if self.schema.is_absolute() {
            self.schema.clone()
        } else {
            config_dir.join(&self.schema)
        }
    }
}

/// Error reading or writing the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Configuration version {0} is newer than supported version {CONFIG_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}
