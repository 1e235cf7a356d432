//! Export pipeline configuration

use kindxml_core::{DEFAULT_MAX_DEPTH, SerializeError, XmlSerializer};
use serde::Deserialize;

/// Entities pulled from the source per parallel serialization batch
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// What to do with a record the serializer rejects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the run on the first bad record
    #[default]
    Fail,
    /// Log and skip the record
    Skip,
}

/// Runtime configuration for the export pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the element wrapping each record
    pub root_tag: String,
    /// Per-level indent; empty for compact fragments
    pub indent: String,
    pub max_depth: usize,
    pub sort_keys: bool,
    /// Serialization threads
    pub workers: usize,
    pub batch_size: usize,
    pub on_error: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            root_tag: "User".to_string(),
            indent: "  ".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            sort_keys: false,
            workers: cpus.min(8),
            batch_size: DEFAULT_BATCH_SIZE,
            on_error: ErrorPolicy::Fail,
        }
    }
}

impl Config {
    /// Build the serializer described by this config
    pub fn serializer(&self) -> Result<XmlSerializer, SerializeError> {
        Ok(XmlSerializer::new(&self.root_tag, &self.indent)?
            .with_max_depth(self.max_depth)
            .with_sorted_keys(self.sort_keys))
    }
}
