//! Sticky variant assignments.
//!
//! Once a viewer is assigned a variant, later page views of the same
//! experiment reuse it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Remembers the variant previously chosen per experiment id.
pub trait AssignmentStore {
    fn load(&self, experiment_id: &str) -> Result<Option<String>>;
    fn save(&self, experiment_id: &str, variant: &str) -> Result<()>;
}

/// JSON file holding `{ <store_key>: { <experiment_id>: <variant> } }`.
///
/// Other top-level keys in the file are preserved on write.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    store_key: String,
}

type StoreFile = BTreeMap<String, BTreeMap<String, String>>;

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, store_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            store_key: store_key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read assignments {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(StoreFile::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("parse assignments {}", self.path.display()))
    }
}

impl AssignmentStore for JsonFileStore {
    fn load(&self, experiment_id: &str) -> Result<Option<String>> {
        let file = self.read_file()?;
        let variant = file
            .get(&self.store_key)
            .and_then(|assignments| assignments.get(experiment_id))
            .cloned();
        debug!(experiment_id, variant = ?variant, "assignment loaded");
        Ok(variant)
    }

    fn save(&self, experiment_id: &str, variant: &str) -> Result<()> {
        debug!(path = %self.path.display(), experiment_id, variant, "writing assignment");
        let mut file = self.read_file()?;
        file.entry(self.store_key.clone())
            .or_default()
            .insert(experiment_id.to_string(), variant.to_string());
        let mut buf = serde_json::to_string_pretty(&file)?;
        buf.push('\n');
        super::write_atomic(&self.path, &buf, "json.tmp")
    }
}
