//! Experimentation options stored in `experiments.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::manifest::ManifestOptions;

/// Experimentation options (TOML).
///
/// Missing fields fall back to the defaults below, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExperimentOptions {
    /// Root under which every experiment keeps its manifest and assets.
    pub base_path: String,

    /// Manifest file name inside `<base_path>/<id>/`.
    pub config_file: String,

    /// Page metadata tag holding the experiment directive.
    pub meta_tag: String,

    /// Query parameter used to force an experiment/variant.
    pub query_parameter: String,

    /// Key the sticky assignments are stored under.
    pub store_key: String,

    /// Prefix applied to patched block code paths.
    pub code_base_path: String,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            base_path: "/experiments".to_string(),
            config_file: "manifest.json".to_string(),
            meta_tag: "experiment".to_string(),
            query_parameter: "experiment".to_string(),
            store_key: "hlx-experiments".to_string(),
            code_base_path: String::new(),
        }
    }
}

impl ExperimentOptions {
    pub fn validate(&self) -> Result<()> {
        if self.base_path.len() > 1 && self.base_path.ends_with('/') {
            return Err(anyhow!("base_path must not end with '/'"));
        }
        for (field, value) in [
            ("config_file", &self.config_file),
            ("meta_tag", &self.meta_tag),
            ("query_parameter", &self.query_parameter),
            ("store_key", &self.store_key),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must not be empty"));
            }
        }
        if self.config_file.contains('/') {
            return Err(anyhow!("config_file must be a file name, got '{}'", self.config_file));
        }
        Ok(())
    }

    pub fn manifest_options(&self) -> ManifestOptions<'_> {
        ManifestOptions {
            base_path: &self.base_path,
            config_file: &self.config_file,
        }
    }

    /// Metadata tags that carry an instant experiment URL list.
    pub fn instant_tags(&self) -> [String; 2] {
        [
            "instant-experiment".to_string(),
            format!("{}-variants", self.meta_tag),
        ]
    }
}

/// Load options from a TOML file.
///
/// If the file is missing, returns `ExperimentOptions::default()`.
pub fn load_config(path: &Path) -> Result<ExperimentOptions> {
    if !path.exists() {
        let cfg = ExperimentOptions::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExperimentOptions =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write options to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExperimentOptions) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf, "toml.tmp")
}
