//! Command-line front end for experiment resolution.
//!
//! Reads a page description (TOML), resolves the experiment against a local
//! content checkout or a live origin, and prints JSON on stdout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use experiments::core::instant::build_instant_config;
use experiments::core::manifest::parse_manifest;
use experiments::core::patcher::{page_override, patch_block};
use experiments::core::types::{BlockDescriptor, ExperimentState};
use experiments::exit_codes;
use experiments::io::assignments::JsonFileStore;
use experiments::io::config::{ExperimentOptions, load_config};
use experiments::io::manifest_source::{FsManifestSource, HttpManifestSource, ManifestSource};
use experiments::io::page::load_page;
use experiments::logging;
use experiments::resolve::{page_location, run_experiment};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "experiments",
    version,
    about = "Resolve page experiments, assign variants, and patch block locations"
)]
struct Cli {
    /// Options file (missing file means defaults).
    #[arg(long, global = true, default_value = "experiments.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the experiment for a page and choose a variant.
    Resolve {
        /// Page description (TOML).
        #[arg(long)]
        page: PathBuf,
        /// Local content root manifests are read from.
        #[arg(long, default_value = ".", conflicts_with = "origin")]
        root: PathBuf,
        /// Fetch manifests over HTTP from this origin instead.
        #[arg(long)]
        origin: Option<String>,
        /// Sticky assignment file.
        #[arg(long, default_value = ".experiments/assignments.json")]
        store: PathBuf,
        /// Fixed roll in [0, 1) instead of a random one.
        #[arg(long)]
        roll: Option<f64>,
    },
    /// Normalize a manifest file into an experiment config.
    Normalize {
        manifest: PathBuf,
        /// Experiment id the manifest belongs to.
        #[arg(long)]
        id: String,
    },
    /// Build an instant experiment config from a comma-separated URL list.
    Instant {
        id: String,
        urls: String,
        /// Path of the page the experiment runs on (control page).
        #[arg(long, default_value = "/")]
        page_path: String,
    },
    /// Patch a block descriptor against a resolved experiment state.
    Patch {
        /// Experiment state JSON, as printed by `resolve`.
        #[arg(long)]
        state: PathBuf,
        /// Page description (TOML).
        #[arg(long)]
        page: PathBuf,
        /// Block to load.
        #[arg(long)]
        block: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveOutput<'a> {
    experiment: &'a ExperimentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_override: Option<&'a str>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let options = load_config(&cli.config).context("load options")?;
    match cli.command {
        Command::Resolve {
            page,
            root,
            origin,
            store,
            roll,
        } => cmd_resolve(&options, &page, &root, origin.as_deref(), &store, roll),
        Command::Normalize { manifest, id } => cmd_normalize(&options, &manifest, &id),
        Command::Instant { id, urls, page_path } => {
            let config = build_instant_config(&id, &urls, &options.manifest_options(), &page_path);
            print_json(&config)?;
            Ok(exit_codes::OK)
        }
        Command::Patch { state, page, block } => cmd_patch(&options, &state, &page, &block),
    }
}

fn cmd_resolve(
    options: &ExperimentOptions,
    page_path: &Path,
    root: &Path,
    origin: Option<&str>,
    store_path: &Path,
    roll: Option<f64>,
) -> Result<i32> {
    let page = load_page(page_path)?;
    let source: Box<dyn ManifestSource> = match origin {
        Some(origin) => Box::new(HttpManifestSource::new(origin, HTTP_TIMEOUT)?),
        None => Box::new(FsManifestSource::new(root)),
    };
    let store = JsonFileStore::new(store_path, options.store_key.clone());
    let roll = roll.unwrap_or_else(rand::random::<f64>);

    let Some(state) = run_experiment(&page, source.as_ref(), &store, options, roll) else {
        eprintln!("no experiment for {}", page.path);
        return Ok(exit_codes::NO_EXPERIMENT);
    };
    print_json(&ResolveOutput {
        experiment: &state,
        page_override: page_override(Some(&state), &page.path),
    })?;
    Ok(exit_codes::OK)
}

fn cmd_normalize(options: &ExperimentOptions, manifest_path: &Path, id: &str) -> Result<i32> {
    let contents = fs::read_to_string(manifest_path)
        .with_context(|| format!("read {}", manifest_path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", manifest_path.display()))?;
    match parse_manifest(&raw, id, &options.manifest_options()) {
        Ok(config) => {
            print_json(&config)?;
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_codes::NO_EXPERIMENT)
        }
    }
}

fn cmd_patch(
    options: &ExperimentOptions,
    state_path: &Path,
    page_path: &Path,
    block_name: &str,
) -> Result<i32> {
    let contents = fs::read_to_string(state_path)
        .with_context(|| format!("read {}", state_path.display()))?;
    let state: ExperimentState = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", state_path.display()))?;
    let page = load_page(page_path)?;
    let location = page_location(&page, options);
    let patched = patch_block(Some(&state), &location, &BlockDescriptor::new(block_name));
    print_json(&patched)?;
    Ok(exit_codes::OK)
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolve_defaults() {
        let cli = Cli::parse_from(["experiments", "resolve", "--page", "page.toml"]);
        assert_eq!(cli.config, PathBuf::from("experiments.toml"));
        match cli.command {
            Command::Resolve {
                root, origin, roll, ..
            } => {
                assert_eq!(root, PathBuf::from("."));
                assert_eq!(origin, None);
                assert_eq!(roll, None);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn parse_instant_with_page_path() {
        let cli = Cli::parse_from([
            "experiments",
            "instant",
            "promo",
            "/b,/c",
            "--page-path",
            "/promo",
        ]);
        assert!(matches!(
            cli.command,
            Command::Instant { ref id, ref page_path, .. } if id == "promo" && page_path == "/promo"
        ));
    }

    #[test]
    fn resolve_rejects_root_with_origin() {
        let parsed = Cli::try_parse_from([
            "experiments",
            "resolve",
            "--page",
            "p.toml",
            "--root",
            "site",
            "--origin",
            "https://a.com",
        ]);
        assert!(parsed.is_err());
    }
}
