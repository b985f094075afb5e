//! Pipeline configuration.
//!
//! The recognized options mirror the post-processing configuration of the
//! extraction toolchain; unknown keys in the JSON file are ignored so the
//! same file can carry extractor-side settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Options controlling the cleaning and merging stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Purge prior report artifacts before running.
    pub delete_files: bool,
    /// Split the `Instrumentation` column into `Presence_*` columns.
    pub unbundle_instrumentation: bool,
    /// Consolidate per-singer columns into `SoundVoice_*` columns.
    pub merge_voices: bool,
    /// Enables key-area and degree grouping for aggregated analysis.
    pub grouped_analysis: bool,
    /// Split the composite `Label_PassionA` label into two columns.
    pub split_passion_a: bool,
    /// Drop the per-degree originals after degree joining.
    pub drop_joined_degrees: bool,
    /// Instrument tokens whose degree columns are joined.
    pub instruments_to_keep: Vec<String>,
    /// Path to the label lookup table (CSV keyed by aria label).
    pub label_lookup: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            delete_files: false,
            unbundle_instrumentation: true,
            merge_voices: true,
            grouped_analysis: true,
            split_passion_a: false,
            drop_joined_degrees: false,
            instruments_to_keep: vec!["vnI".to_string()],
            label_lookup: None,
        }
    }
}

impl ProcessConfig {
    /// Loads the configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
