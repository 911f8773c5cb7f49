//! Parsing of the page-level experiment directive and the query override.
//!
//! The directive is the value of the experiment metadata tag:
//!
//! - `id` → manifest experiment
//! - `id:variant` → manifest experiment with a forced variant
//! - `id:variant:url1,url2` → instant experiment (variant may be empty)

use crate::core::naming::to_class_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Load `<basePath>/<id>/<configFile>`.
    Manifest,
    /// Build the config inline from a comma-separated URL list.
    Instant { variant_urls: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub experiment_id: String,
    pub forced_variant: Option<String>,
    pub mode: Mode,
}

/// Parse the metadata directive. Returns `None` when no experiment id is set.
pub fn parse_directive(raw: &str) -> Option<Directive> {
    let mut parts = raw.trim().splitn(3, ':');
    let experiment_id = to_class_name(parts.next()?);
    if experiment_id.is_empty() {
        return None;
    }
    let forced_variant = parts.next().map(to_class_name).filter(|v| !v.is_empty());
    let mode = match parts.next().map(str::trim) {
        Some(urls) if !urls.is_empty() => Mode::Instant {
            variant_urls: urls.to_string(),
        },
        _ => Mode::Manifest,
    };
    Some(Directive {
        experiment_id,
        forced_variant,
        mode,
    })
}

/// Experiment (and optionally variant) forced through the query string as
/// `?experiment=id/variant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedExperiment {
    pub experiment_id: String,
    pub variant: Option<String>,
}

pub fn parse_forced(raw: &str) -> Option<ForcedExperiment> {
    let (id, variant) = match raw.trim().split_once('/') {
        Some((id, variant)) => (id, Some(variant)),
        None => (raw.trim(), None),
    };
    let experiment_id = to_class_name(id);
    if experiment_id.is_empty() {
        return None;
    }
    Some(ForcedExperiment {
        experiment_id,
        variant: variant.map(to_class_name).filter(|v| !v.is_empty()),
    })
}
