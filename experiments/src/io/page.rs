//! The page view an experiment is resolved for.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::manifest::split_list;

static BOT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)bot|crawl|spider").unwrap());

/// Environment inspection needed before an experiment can be resolved.
pub trait PageContext {
    /// Clients (crawlers, bots) that must never enter an experiment.
    fn is_excluded_client(&self) -> bool;

    /// Page-level metadata value for `name`, if set.
    fn metadata(&self, name: &str) -> Option<String>;

    /// Query string parameter value for `name`, if set.
    fn query_param(&self, name: &str) -> Option<String>;

    /// Scheme + host of the page, without trailing slash.
    fn origin(&self) -> &str;

    fn path(&self) -> &str;

    /// Whether the viewer belongs to `audience`. An empty audience matches
    /// everyone.
    fn matches_audience(&self, audience: &str) -> bool {
        audience.trim().is_empty()
    }
}

/// A page view described in a TOML file.
///
/// ```toml
/// origin = "https://main--site--org.hlx.page"
/// path = "/index"
/// user_agent = "Mozilla/5.0"
/// audiences = ["mobile"]
///
/// [metadata]
/// experiment = "hero-test"
///
/// [query]
/// experiment = "hero-test/challenger-1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPage {
    pub origin: String,
    pub path: String,
    pub user_agent: String,
    /// Audiences the viewer belongs to.
    pub audiences: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl StaticPage {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(anyhow!("path must start with '/', got '{}'", self.path));
        }
        if self.origin.ends_with('/') {
            return Err(anyhow!("origin must not end with '/'"));
        }
        Ok(())
    }
}

impl PageContext for StaticPage {
    fn is_excluded_client(&self) -> bool {
        BOT_RE.is_match(&self.user_agent)
    }

    fn metadata(&self, name: &str) -> Option<String> {
        self.metadata
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn matches_audience(&self, audience: &str) -> bool {
        let wanted = split_list(audience);
        wanted.is_empty()
            || wanted.iter().any(|tag| {
                self.audiences
                    .iter()
                    .any(|member| member.trim().eq_ignore_ascii_case(tag))
            })
    }
}

/// Load a page description from a TOML file.
pub fn load_page(path: &Path) -> Result<StaticPage> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let page: StaticPage =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    page.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bots_are_excluded() {
        let mut page = StaticPage::default();
        page.user_agent = "Mozilla/5.0 (compatible; Googlebot/2.1)".to_string();
        assert!(page.is_excluded_client());
        page.user_agent = "AhrefsSpider".to_string();
        assert!(page.is_excluded_client());
        page.user_agent = "Mozilla/5.0 (Macintosh)".to_string();
        assert!(!page.is_excluded_client());
    }

    #[test]
    fn audience_matching_accepts_any_listed_tag() {
        let page = StaticPage {
            audiences: vec!["Mobile".to_string()],
            ..StaticPage::default()
        };
        assert!(page.matches_audience(""));
        assert!(page.matches_audience("desktop, mobile"));
        assert!(!page.matches_audience("desktop"));
    }

    #[test]
    fn blank_metadata_is_absent() {
        let mut page = StaticPage::default();
        page.metadata.insert("experiment".to_string(), "  ".to_string());
        assert_eq!(page.metadata("experiment"), None);
        assert_eq!(page.metadata("missing"), None);
    }

    #[test]
    fn load_page_parses_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("page.toml");
        fs::write(
            &path,
            "origin = \"https://a.com\"\npath = \"/x\"\n[metadata]\nexperiment = \"hero\"\n",
        )
        .expect("write");
        let page = load_page(&path).expect("load");
        assert_eq!(page.origin(), "https://a.com");
        assert_eq!(page.metadata("experiment").as_deref(), Some("hero"));
    }

    #[test]
    fn load_page_rejects_relative_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("page.toml");
        fs::write(&path, "origin = \"https://a.com\"\npath = \"x\"\n").expect("write");
        let err = load_page(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("path must start with '/'"));
    }
}
