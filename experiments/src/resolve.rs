//! Dispatch from a page view to a runtime experiment state.
//!
//! Every failure degrades to "no experiment": errors are logged and the page
//! renders with its defaults.

use tracing::{debug, info, warn};

use crate::core::directive::{Mode, parse_directive, parse_forced};
use crate::core::instant::build_instant_config;
use crate::core::manifest::parse_manifest;
use crate::core::selector::select_variant;
use crate::core::types::{ExperimentConfig, ExperimentState, PageLocation, Status};
use crate::core::url::last_segment;
use crate::error::{ResolveError, Result};
use crate::io::assignments::AssignmentStore;
use crate::io::config::ExperimentOptions;
use crate::io::manifest_source::{ManifestSource, validate_manifest_shape};
use crate::io::page::PageContext;

/// A resolved config plus the variant the directive asked for, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub config: ExperimentConfig,
    pub forced_variant: Option<String>,
}

/// Resolve the experiment config that applies to `page`, if any.
pub fn resolve_config(
    page: &dyn PageContext,
    source: &dyn ManifestSource,
    options: &ExperimentOptions,
) -> Option<ExperimentConfig> {
    resolve(page, source, options).map(|resolution| resolution.config)
}

/// Resolve the config, choose a variant, and build the runtime state.
///
/// `roll` is a uniform sample in `[0, 1)` used only when no forced or sticky
/// assignment applies.
pub fn run_experiment(
    page: &dyn PageContext,
    source: &dyn ManifestSource,
    store: &dyn AssignmentStore,
    options: &ExperimentOptions,
    roll: f64,
) -> Option<ExperimentState> {
    let resolution = resolve(page, source, options)?;
    Some(build_state(page, store, options, resolution, roll))
}

/// Location used by the block patcher for this page.
pub fn page_location(page: &dyn PageContext, options: &ExperimentOptions) -> PageLocation {
    PageLocation {
        origin: page.origin().trim_end_matches('/').to_string(),
        path: page.path().to_string(),
        code_base_path: options.code_base_path.clone(),
    }
}

/// Fetch, shape-check and normalize `<basePath>/<id>/<configFile>`.
pub fn load_manifest_config(
    experiment_id: &str,
    source: &dyn ManifestSource,
    options: &ExperimentOptions,
) -> Result<ExperimentConfig> {
    let manifest_options = options.manifest_options();
    let location = manifest_options.manifest_location(experiment_id);
    let raw = source
        .fetch_json(&location)
        .map_err(|err| ResolveError::FetchFailure {
            location: location.clone(),
            reason: format!("{err:#}"),
        })?;
    validate_manifest_shape(&raw).map_err(|err| ResolveError::malformed(format!("{err:#}")))?;
    parse_manifest(&raw, experiment_id, &manifest_options)
}

fn resolve(
    page: &dyn PageContext,
    source: &dyn ManifestSource,
    options: &ExperimentOptions,
) -> Option<Resolution> {
    match try_resolve(page, source, options) {
        Ok(resolution) => Some(resolution),
        Err(err @ ResolveError::NotFound(_)) => {
            debug!(error = %err, "no experiment for page");
            None
        }
        Err(err) => {
            warn!(error = %err, "experiment config unavailable, rendering defaults");
            None
        }
    }
}

fn try_resolve(
    page: &dyn PageContext,
    source: &dyn ManifestSource,
    options: &ExperimentOptions,
) -> Result<Resolution> {
    if page.is_excluded_client() {
        return Err(ResolveError::NotFound("excluded client".to_string()));
    }
    let raw = page.metadata(&options.meta_tag).ok_or_else(|| {
        ResolveError::NotFound(format!("no '{}' metadata", options.meta_tag))
    })?;
    let directive = parse_directive(&raw)
        .ok_or_else(|| ResolveError::NotFound(format!("empty directive '{raw}'")))?;

    let instant_urls = match directive.mode {
        Mode::Instant { variant_urls } => Some(variant_urls),
        Mode::Manifest => options
            .instant_tags()
            .iter()
            .find_map(|tag| page.metadata(tag)),
    };

    let config = match instant_urls {
        Some(urls) => {
            debug!(experiment_id = %directive.experiment_id, "building instant experiment");
            let config = build_instant_config(
                &directive.experiment_id,
                &urls,
                &options.manifest_options(),
                page.path(),
            );
            if config.variant_names.len() < 2 {
                return Err(ResolveError::malformed(
                    "instant experiment lists no variant URLs",
                ));
            }
            config
        }
        None => load_manifest_config(&directive.experiment_id, source, options)?,
    };

    Ok(Resolution {
        config,
        forced_variant: directive.forced_variant,
    })
}

fn build_state(
    page: &dyn PageContext,
    store: &dyn AssignmentStore,
    options: &ExperimentOptions,
    resolution: Resolution,
    roll: f64,
) -> ExperimentState {
    let Resolution {
        config,
        forced_variant,
    } = resolution;

    let forced = page
        .query_param(&options.query_parameter)
        .and_then(|raw| parse_forced(&raw))
        .filter(|forced| forced.experiment_id == config.id);
    let forced_variant = forced
        .as_ref()
        .and_then(|forced| forced.variant.clone())
        .or(forced_variant)
        .filter(|variant| config.variant_names.contains(variant));

    let run = config.is_valid()
        && (forced.is_some()
            || (config.status == Status::Active && page.matches_audience(&config.audience)));

    let selected_variant = if !run {
        config.variant_names.first().cloned().unwrap_or_default()
    } else if let Some(variant) = forced_variant {
        variant
    } else {
        sticky_or_selected(store, &config, roll)
    };

    let blocks = targeted_blocks(&config);
    info!(
        experiment_id = %config.id,
        variant = %selected_variant,
        run,
        "experiment resolved"
    );

    ExperimentState {
        id: config.id,
        run,
        selected_variant,
        variant_names: config.variant_names,
        blocks,
        variants: config.variants,
    }
}

fn sticky_or_selected(store: &dyn AssignmentStore, config: &ExperimentConfig, roll: f64) -> String {
    match store.load(&config.id) {
        Ok(Some(variant)) if config.variant_names.contains(&variant) => {
            debug!(experiment_id = %config.id, %variant, "reusing sticky assignment");
            return variant;
        }
        Ok(_) => {}
        Err(err) => warn!(experiment_id = %config.id, error = %format!("{err:#}"), "assignment lookup failed"),
    }

    let variant = select_variant(config, roll);
    if let Err(err) = store.save(&config.id, &variant) {
        warn!(experiment_id = %config.id, error = %format!("{err:#}"), "assignment save failed");
    }
    variant
}

/// Block names named by control's override entries, in order, deduplicated.
fn targeted_blocks(config: &ExperimentConfig) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let Some(control) = config.control() else {
        return blocks;
    };
    for entry in &control.blocks {
        let name = last_segment(entry);
        if !name.is_empty() && !blocks.contains(&name) {
            blocks.push(name);
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        MemoryStore, ScriptedSource, hero_page, manifest_fixture, page_with_metadata,
    };

    fn options() -> ExperimentOptions {
        ExperimentOptions::default()
    }

    #[test]
    fn resolves_manifest_experiment_from_metadata() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let config = resolve_config(&hero_page(), &source, &options()).expect("config");
        assert_eq!(config.id, "hero-test");
        assert_eq!(source.requests(), vec!["/experiments/hero-test/manifest.json"]);
    }

    #[test]
    fn missing_metadata_resolves_to_none_without_fetching() {
        let source = ScriptedSource::default();
        let page = page_with_metadata(&[]);
        assert_eq!(resolve_config(&page, &source, &options()), None);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn excluded_client_resolves_to_none() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let mut page = hero_page();
        page.user_agent = "Googlebot".to_string();
        assert_eq!(resolve_config(&page, &source, &options()), None);
    }

    #[test]
    fn fetch_failure_resolves_to_none() {
        let source = ScriptedSource::default();
        assert_eq!(resolve_config(&hero_page(), &source, &options()), None);
        let err = load_manifest_config("hero-test", &source, &options()).expect_err("fetch");
        assert!(matches!(err, ResolveError::FetchFailure { .. }));
    }

    #[test]
    fn malformed_manifest_resolves_to_none() {
        let source = ScriptedSource::with(
            "/experiments/hero-test/manifest.json",
            serde_json::json!({"experiences": {"data": 3}}),
        );
        let err = load_manifest_config("hero-test", &source, &options()).expect_err("shape");
        assert!(matches!(err, ResolveError::MalformedConfig(_)));
        assert_eq!(resolve_config(&hero_page(), &source, &options()), None);
    }

    #[test]
    fn instant_directive_skips_manifest_fetch() {
        let source = ScriptedSource::default();
        let page = page_with_metadata(&[("experiment", "promo::/promo-b, /promo-c")]);
        let config = resolve_config(&page, &source, &options()).expect("config");
        assert_eq!(config.label, "Instant Experiment: promo");
        assert_eq!(config.variant_names.len(), 3);
        assert_eq!(config.variants["control"].pages, vec!["/index"]);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn instant_metadata_tag_selects_instant_mode() {
        let source = ScriptedSource::default();
        let page = page_with_metadata(&[
            ("experiment", "promo"),
            ("experiment-variants", "/promo-b"),
        ]);
        let config = resolve_config(&page, &source, &options()).expect("config");
        assert_eq!(config.variants["challenger-1"].pages, vec!["/promo-b"]);
        assert_eq!(config.variants["challenger-1"].percentage_split, "0.50");
    }

    #[test]
    fn instant_directive_without_urls_resolves_to_none() {
        let source = ScriptedSource::default();
        let page = page_with_metadata(&[("experiment", "promo:: , ")]);
        assert_eq!(resolve_config(&page, &source, &options()), None);
        let state = run_experiment(&page, &source, &MemoryStore::default(), &options(), 0.5);
        assert_eq!(state, None);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn blank_instant_metadata_tag_resolves_to_none() {
        let source = ScriptedSource::default();
        let page = page_with_metadata(&[("experiment", "promo"), ("experiment-variants", ",")]);
        assert_eq!(resolve_config(&page, &source, &options()), None);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn run_selects_by_roll_and_persists_assignment() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let store = MemoryStore::default();
        let state = run_experiment(&hero_page(), &source, &store, &options(), 0.6).expect("state");

        assert!(state.run);
        assert_eq!(state.selected_variant, "challenger-1");
        assert_eq!(state.blocks, vec!["hero", "cards"]);
        assert_eq!(store.get("hero-test").as_deref(), Some("challenger-1"));
    }

    #[test]
    fn sticky_assignment_wins_over_roll() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let store = MemoryStore::default();
        store.save("hero-test", "challenger-2").expect("seed");
        let state = run_experiment(&hero_page(), &source, &store, &options(), 0.0).expect("state");
        assert_eq!(state.selected_variant, "challenger-2");
    }

    #[test]
    fn unknown_sticky_assignment_is_replaced() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let store = MemoryStore::default();
        store.save("hero-test", "challenger-9").expect("seed");
        let state = run_experiment(&hero_page(), &source, &store, &options(), 0.0).expect("state");
        assert_eq!(state.selected_variant, "control");
        assert_eq!(store.get("hero-test").as_deref(), Some("control"));
    }

    #[test]
    fn failing_store_does_not_block_selection() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let store = MemoryStore::failing();
        let state = run_experiment(&hero_page(), &source, &store, &options(), 0.9).expect("state");
        assert!(state.run);
        assert_eq!(state.selected_variant, "challenger-2");
    }

    #[test]
    fn query_parameter_forces_inactive_experiment_and_variant() {
        let mut manifest = manifest_fixture();
        manifest["settings"]["data"][2]["Value"] = "Inactive".into();
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest);
        let store = MemoryStore::default();

        let inactive = run_experiment(&hero_page(), &source, &store, &options(), 0.9).expect("state");
        assert!(!inactive.run);
        assert_eq!(inactive.selected_variant, "control");

        let mut page = hero_page();
        page.query
            .insert("experiment".to_string(), "hero-test/challenger-1".to_string());
        let forced = run_experiment(&page, &source, &store, &options(), 0.9).expect("state");
        assert!(forced.run);
        assert_eq!(forced.selected_variant, "challenger-1");
        assert_eq!(store.get("hero-test"), None);
    }

    #[test]
    fn query_parameter_for_other_experiment_is_ignored() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let mut page = hero_page();
        page.query
            .insert("experiment".to_string(), "other/challenger-2".to_string());
        let state =
            run_experiment(&page, &source, &MemoryStore::default(), &options(), 0.0).expect("state");
        assert_eq!(state.selected_variant, "control");
    }

    #[test]
    fn directive_variant_is_forced_when_known() {
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest_fixture());
        let page = page_with_metadata(&[("experiment", "hero-test:challenger-2")]);
        let state =
            run_experiment(&page, &source, &MemoryStore::default(), &options(), 0.0).expect("state");
        assert_eq!(state.selected_variant, "challenger-2");
    }

    #[test]
    fn audience_mismatch_does_not_run() {
        let mut manifest = manifest_fixture();
        manifest["settings"]["data"][1]["Value"] = "desktop".into();
        let source = ScriptedSource::with("/experiments/hero-test/manifest.json", manifest);
        let state = run_experiment(&hero_page(), &source, &MemoryStore::default(), &options(), 0.9)
            .expect("state");
        assert!(!state.run);
    }

    #[test]
    fn page_location_uses_configured_code_base_path() {
        let options = ExperimentOptions {
            code_base_path: "/code".to_string(),
            ..ExperimentOptions::default()
        };
        let location = page_location(&hero_page(), &options);
        assert_eq!(location.origin, "https://main--site--org.hlx.page");
        assert_eq!(location.path, "/index");
        assert_eq!(location.code_base_path, "/code");
    }
}
