//! Manifest retrieval: filesystem and HTTP sources plus shape validation.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

const MANIFEST_SCHEMA: &str = include_str!("../../schemas/manifest/v1.schema.json");

/// Fetches the JSON document stored at a site-relative location such as
/// `/experiments/hero/manifest.json`.
pub trait ManifestSource {
    fn fetch_json(&self, location: &str) -> Result<Value>;
}

/// Serves manifests from a local checkout of the site content.
#[derive(Debug, Clone)]
pub struct FsManifestSource {
    root: PathBuf,
}

impl FsManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            bail!("manifest location escapes content root: {location}");
        }
        Ok(self.root.join(relative))
    }
}

impl ManifestSource for FsManifestSource {
    fn fetch_json(&self, location: &str) -> Result<Value> {
        let path = self.resolve(location)?;
        debug!(path = %path.display(), "reading manifest");
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }
}

/// Fetches manifests over HTTP from a site origin.
#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    origin: String,
    client: reqwest::blocking::Client,
}

impl HttpManifestSource {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch_json(&self, location: &str) -> Result<Value> {
        let url = format!("{}{}", self.origin, location);
        debug!(%url, "fetching manifest");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        response
            .json::<Value>()
            .with_context(|| format!("parse json from {url}"))
    }
}

/// Check the two-table manifest shape before normalization.
pub fn validate_manifest_shape(manifest: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).context("parse manifest schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(manifest) {
        let messages = compiled
            .iter_errors(manifest)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "manifest schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
