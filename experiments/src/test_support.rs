//! Test-only helpers: fixtures, scripted collaborators, and page builders.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::core::manifest::ManifestOptions;
use crate::core::types::{ExperimentState, PageLocation, Variant};
use crate::core::url::last_segment;
use crate::io::assignments::AssignmentStore;
use crate::io::manifest_source::ManifestSource;
use crate::io::page::StaticPage;

pub const ORIGIN: &str = "https://main--site--org.hlx.page";

/// Default manifest location options (`/experiments`, `manifest.json`).
pub fn manifest_options() -> ManifestOptions<'static> {
    ManifestOptions {
        base_path: "/experiments",
        config_file: "manifest.json",
    }
}

/// Three-variant manifest with a continuation row under `Blocks`.
///
/// `challenger-2` overrides only the first block.
pub fn manifest_fixture() -> Value {
    json!({
        "settings": {
            "total": 3,
            "data": [
                {"Name": "Experiment Name", "Value": "Hero Test"},
                {"Name": "Audience", "Value": ""},
                {"Name": "Status", "Value": "Active"}
            ]
        },
        "experiences": {
            "total": 5,
            "data": [
                {"Name": "Label", "control": "Control", "challenger-1": "Bold hero", "challenger-2": "Minimal hero"},
                {"Name": "Percentage Split", "control": "", "challenger-1": "0.25", "challenger-2": "0.25"},
                {
                    "Name": "Pages",
                    "control": format!("{ORIGIN}/index"),
                    "challenger-1": format!("{ORIGIN}/experiments/hero-test/challenger-1"),
                    "challenger-2": "/experiments/hero-test/challenger-2"
                },
                {
                    "Name": "Blocks",
                    "control": "hero",
                    "challenger-1": format!("{ORIGIN}/experiments/hero-test/blocks/hero"),
                    "challenger-2": "https://bar.hlx.live"
                },
                {"Name": "", "control": "/blocks/cards", "challenger-1": "cards-v2", "challenger-2": ""}
            ]
        },
        ":names": ["settings", "experiences"],
        ":type": "multi-sheet"
    })
}

/// Page at `/index` on [`ORIGIN`] carrying the given metadata.
pub fn page_with_metadata(metadata: &[(&str, &str)]) -> StaticPage {
    StaticPage {
        origin: ORIGIN.to_string(),
        path: "/index".to_string(),
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)".to_string(),
        metadata: metadata
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        ..StaticPage::default()
    }
}

/// Page opted into the `hero-test` manifest experiment.
pub fn hero_page() -> StaticPage {
    page_with_metadata(&[("experiment", "hero-test")])
}

pub fn page_location() -> PageLocation {
    PageLocation {
        origin: ORIGIN.to_string(),
        path: "/index".to_string(),
        code_base_path: String::new(),
    }
}

/// Running two-variant state with `challenger-1` selected.
pub fn state_with_blocks(control_blocks: &[&str], challenger_blocks: &[&str]) -> ExperimentState {
    let to_vec = |items: &[&str]| items.iter().map(|item| item.to_string()).collect::<Vec<_>>();
    let mut variants = BTreeMap::new();
    variants.insert(
        "control".to_string(),
        Variant {
            label: "Control".to_string(),
            percentage_split: String::new(),
            pages: vec!["/index".to_string()],
            blocks: to_vec(control_blocks),
        },
    );
    variants.insert(
        "challenger-1".to_string(),
        Variant {
            label: "Challenger 1".to_string(),
            percentage_split: "0.5".to_string(),
            pages: vec!["/index-b".to_string()],
            blocks: to_vec(challenger_blocks),
        },
    );
    ExperimentState {
        id: "test".to_string(),
        run: true,
        selected_variant: "challenger-1".to_string(),
        variant_names: vec!["control".to_string(), "challenger-1".to_string()],
        blocks: control_blocks.iter().map(|entry| last_segment(entry)).collect(),
        variants,
    }
}

/// Manifest source answering from a fixed map and recording each request.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: BTreeMap<String, Value>,
    requests: RefCell<Vec<String>>,
}

impl ScriptedSource {
    pub fn with(location: &str, manifest: Value) -> Self {
        let mut source = Self::default();
        source.responses.insert(location.to_string(), manifest);
        source
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ManifestSource for ScriptedSource {
    fn fetch_json(&self, location: &str) -> Result<Value> {
        self.requests.borrow_mut().push(location.to_string());
        self.responses
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow!("404 Not Found: {location}"))
    }
}

/// In-memory assignment store. `failing()` errors on every call.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assignments: RefCell<BTreeMap<String, String>>,
    failing: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn get(&self, experiment_id: &str) -> Option<String> {
        self.assignments.borrow().get(experiment_id).cloned()
    }
}

impl AssignmentStore for MemoryStore {
    fn load(&self, experiment_id: &str) -> Result<Option<String>> {
        if self.failing {
            return Err(anyhow!("store unavailable"));
        }
        Ok(self.get(experiment_id))
    }

    fn save(&self, experiment_id: &str, variant: &str) -> Result<()> {
        if self.failing {
            return Err(anyhow!("store unavailable"));
        }
        self.assignments
            .borrow_mut()
            .insert(experiment_id.to_string(), variant.to_string());
        Ok(())
    }
}
