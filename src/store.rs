//! Key-value hand-off between the model builder and whatever displays results.
//!
//! The pipeline never touches a store itself; callers save the
//! [`PipelineResult`] under [`MODEL_RESULTS_KEY`] after a run and the results
//! view reads it back. Values are JSON text so any backend can hold them.

use crate::error::{Result, ResultExt as _, TabmlError};
use crate::model_builder::PipelineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key the latest run is stored under.
pub const MODEL_RESULTS_KEY: &str = "modelResults";

pub trait ResultStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `<data_dir>/tabml/store`.
    pub fn default_location() -> Self {
        Self::new(
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tabml")
                .join("store"),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TabmlError::Config(format!("Invalid store key: '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ResultStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store directory {}", self.dir.display()))?;
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// A stored run with the time it was saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredResults {
    pub saved_at: DateTime<Utc>,
    pub result: PipelineResult,
}

/// Saves `result` under [`MODEL_RESULTS_KEY`], replacing any previous run.
pub fn save_results(store: &mut dyn ResultStore, result: &PipelineResult) -> Result<()> {
    let stored = StoredResults {
        saved_at: Utc::now(),
        result: result.clone(),
    };
    let json = serde_json::to_string(&stored)?;
    store.set(MODEL_RESULTS_KEY, json)?;
    tracing::debug!("Saved model results under '{MODEL_RESULTS_KEY}'");
    Ok(())
}

/// The last saved run, if any.
pub fn load_results(store: &dyn ResultStore) -> Result<Option<StoredResults>> {
    store
        .get(MODEL_RESULTS_KEY)?
        .map(|json| serde_json::from_str(&json).context("Stored model results are unreadable"))
        .transpose()
}
