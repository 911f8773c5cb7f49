//! Shared deterministic types for experiment resolution.
//!
//! These types define the stable contracts between the normalizer, the instant
//! builder, the variant selector and the block patcher. They serialize to the
//! camelCase JSON shape consumed by page-side collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id of the implicit baseline variant. Always `variant_names[0]`.
pub const CONTROL: &str = "control";

/// Normalized experiment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    /// Case-insensitive parse; anything other than `active` is inactive.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("active") {
            Status::Active
        } else {
            Status::Inactive
        }
    }
}

/// One treatment within an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub label: String,
    /// Decimal-string traffic share. Empty for control.
    pub percentage_split: String,
    pub pages: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
}

/// Strict, normalized experiment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    pub label: String,
    pub audience: String,
    pub status: Status,
    pub base_path: String,
    /// Location the config was loaded from. `None` for instant experiments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    pub variant_names: Vec<String>,
    pub variants: BTreeMap<String, Variant>,
}

impl ExperimentConfig {
    pub fn control(&self) -> Option<&Variant> {
        self.variant_names
            .first()
            .and_then(|name| self.variants.get(name))
    }

    /// Structural check: control first, every name has exactly one variant,
    /// and every challenger declares a split.
    pub fn is_valid(&self) -> bool {
        if self.variant_names.first().map(String::as_str) != Some(CONTROL) {
            return false;
        }
        if self.variant_names.len() < 2 || self.variants.len() != self.variant_names.len() {
            return false;
        }
        self.variant_names.iter().enumerate().all(|(idx, name)| {
            match self.variants.get(name) {
                Some(variant) => idx == 0 || !variant.percentage_split.trim().is_empty(),
                None => false,
            }
        })
    }
}

/// Per-page runtime state produced once the variant has been chosen.
///
/// Written once per page load and read by every block load afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentState {
    pub id: String,
    pub run: bool,
    pub selected_variant: String,
    pub variant_names: Vec<String>,
    /// Block names targeted by any override in this experiment.
    pub blocks: Vec<String>,
    pub variants: BTreeMap<String, Variant>,
}

impl ExperimentState {
    pub fn control(&self) -> Option<&Variant> {
        self.variant_names
            .first()
            .and_then(|name| self.variants.get(name))
    }

    pub fn selected(&self) -> Option<&Variant> {
        self.variants.get(&self.selected_variant)
    }

    pub fn is_control_selected(&self) -> bool {
        self.variant_names.first() == Some(&self.selected_variant)
    }
}

/// Where the current page lives, used to tell same-origin overrides apart
/// from cross-origin ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLocation {
    /// Scheme + host (+ port), without trailing slash.
    pub origin: String,
    pub path: String,
    /// Prefix applied to every patched block path (usually empty).
    #[serde(default)]
    pub code_base_path: String,
}

/// Block load request passed through the patcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    pub block_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_path: Option<String>,
    /// Fields the patcher carries through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl BlockDescriptor {
    pub fn new(block_name: impl Into<String>) -> Self {
        Self {
            block_name: block_name.into(),
            css_path: None,
            js_path: None,
            extra: BTreeMap::new(),
        }
    }
}
