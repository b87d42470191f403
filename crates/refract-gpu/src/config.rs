// Graphics configuration: adapter choice and defaults applied to generated layouts.
// Stored at e.g. ~/.config/refract/config.json on Linux,
// ~/Library/Application Support/refract/config.json on macOS.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    None,
    LowPower,
    #[default]
    HighPerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    #[serde(default)]
    pub power_preference: PowerPreference,
    /// Generated binding-group layouts are visible to the vertex stage.
    #[serde(default = "default_true")]
    pub vertex_visible: bool,
    /// Generated binding-group layouts are visible to the fragment stage.
    #[serde(default = "default_true")]
    pub fragment_visible: bool,
    /// Attach a `Depth24Plus` depth test to compiled pipelines.
    #[serde(default = "default_true")]
    pub depth_test: bool,
    /// Prefix for labels of staging buffers and generated layouts.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_label_prefix() -> String {
    "refract".to_string()
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            power_preference: PowerPreference::default(),
            vertex_visible: true,
            fragment_visible: true,
            depth_test: true,
            label_prefix: default_label_prefix(),
        }
    }
}

impl GraphicsConfig {
    pub fn default_path() -> Option<PathBuf> {
        let config_dir = dirs::config_dir()?;
        Some(config_dir.join("refract").join("config.json"))
    }

    /// Loads the user config, falling back to defaults when it is missing or invalid.
    pub fn load() -> Self {
        let path = match Self::default_path() {
            Some(p) => p,
            None => return Self::default(),
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}", e);
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn visibility(&self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::NONE;
        if self.vertex_visible {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.fragment_visible {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        stages
    }

    pub fn power_preference(&self) -> wgpu::PowerPreference {
        match self.power_preference {
            PowerPreference::None => wgpu::PowerPreference::None,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }

    pub(crate) fn label(&self, name: &str) -> String {
        format!("{}:{}", self.label_prefix, name)
    }
}
