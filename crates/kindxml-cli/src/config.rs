//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kindxml_datastore::ErrorPolicy;
use serde::Deserialize;

/// Global configuration for kindxml
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub xml: XmlConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    pub job: JobConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XmlConfig {
    pub root_tag: String,
    pub indent: String,
    pub max_depth: usize,
    pub sort_keys: bool,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            root_tag: "User".to_string(),
            indent: "  ".to_string(),
            max_depth: kindxml_core::DEFAULT_MAX_DEPTH,
            sort_keys: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub header: String,
    pub num_shards: usize,
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            header: "<HEADER>".to_string(),
            num_shards: 1,
            suffix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
    pub on_error: ErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let defaults = kindxml_datastore::Config::default();
        Self {
            workers: defaults.workers,
            on_error: defaults.on_error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub region: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            region: "us-east1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./kindxml.toml (current directory)
    /// 2. ~/.config/kindxml/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("kindxml.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "kindxml") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
