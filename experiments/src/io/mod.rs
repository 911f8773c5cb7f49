//! Side-effecting collaborators for experiment resolution.
//!
//! Each concern sits behind a trait so orchestration can be driven by scripted
//! implementations in tests.

pub mod assignments;
pub mod config;
pub mod manifest_source;
pub mod page;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Write `contents` next to `path` under a temporary extension, then rename.
pub(crate) fn write_atomic(path: &Path, contents: &str, tmp_extension: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension(tmp_extension);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
