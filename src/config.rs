//! Pipeline settings.
//!
//! Defaults reproduce the model builder's fixed behaviour (100-row inference
//! sample, 80/20 split, 1st/99th percentile winsorisation, 4-row minimum). The
//! settings file only exists so these can be tuned without rebuilding.

use crate::error::{Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TreeSettings {
    /// Maximum tree depth; `None` grows until leaves are pure or too small.
    /// The classifier never goes past
    /// [`CLASSIFIER_DEPTH_LIMIT`](crate::model_builder::learner::CLASSIFIER_DEPTH_LIMIT).
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Rows sampled by the full type inference pass
    pub full_sample_rows: usize,
    /// Rows sampled by the quick pass used while configuring the wizard
    pub quick_sample_rows: usize,
    /// Share of numeric cells the quick pass needs to call a column numeric
    pub quick_numeric_ratio: f64,
    /// Leading share of rows used for training; the rest is held out
    pub train_fraction: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Minimum number of rows before a model is attempted
    pub min_rows: usize,
    pub tree: TreeSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            full_sample_rows: 100,
            quick_sample_rows: 10,
            quick_numeric_ratio: 0.7,
            train_fraction: 0.8,
            lower_percentile: 0.01,
            upper_percentile: 0.99,
            min_rows: 4,
            tree: TreeSettings::default(),
        }
    }
}

pub fn get_settings_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tabml")
        .join("settings.json")
}

/// Loads settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_settings_from(path: &Path) -> PipelineSettings {
    if path.exists()
        && let Ok(content) = std::fs::read_to_string(path)
    {
        match serde_json::from_str::<PipelineSettings>(&content) {
            Ok(settings) => return settings,
            Err(e) => tracing::warn!("Ignoring unreadable settings file {}: {e}", path.display()),
        }
    }

    PipelineSettings::default()
}

pub fn load_settings() -> PipelineSettings {
    load_settings_from(&get_settings_path())
}

pub fn save_settings_to(settings: &PipelineSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;
    Ok(())
}
