//! Tabular manifest → [`ExperimentConfig`] normalization.
//!
//! A manifest carries two tables, `settings` and `experiences`, each shaped as
//! `{ "data": [ { "Name": ..., <column>: ... }, ... ] }`.
//!
//! `settings` rows are `{Name, Value}` pairs folded into a flat map.
//! `experiences` rows describe one attribute each (`Label`, `Percentage
//! Split`, `Pages`, `Blocks`) with one column per variant. A row with an empty
//! `Name` continues the attribute of the row above it, which is how multi-row
//! page and block lists are written.
//!
//! Parsing runs in two phases: the variant column set is read from the row
//! headers first, then every attribute row is mapped onto that fixed set.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::core::naming::{to_camel_case, to_class_name};
use crate::core::types::{CONTROL, ExperimentConfig, Status, Variant};
use crate::core::url::path_of;
use crate::error::{ResolveError, Result};

const NAME_COLUMN: &str = "Name";
const VALUE_COLUMN: &str = "Value";

/// Where manifests live, used to fill `base_path` and `manifest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestOptions<'a> {
    pub base_path: &'a str,
    pub config_file: &'a str,
}

impl ManifestOptions<'_> {
    pub fn experiment_base_path(&self, experiment_id: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), experiment_id)
    }

    pub fn manifest_location(&self, experiment_id: &str) -> String {
        format!(
            "{}/{}",
            self.experiment_base_path(experiment_id),
            self.config_file
        )
    }
}

/// Normalize an already-parsed manifest. Returns `None` for any manifest that
/// does not describe at least one usable challenger.
pub fn normalize_manifest(
    raw: &Value,
    experiment_id: &str,
    options: &ManifestOptions<'_>,
) -> Option<ExperimentConfig> {
    parse_manifest(raw, experiment_id, options).ok()
}

/// Same as [`normalize_manifest`] but reports why a manifest was rejected.
pub fn parse_manifest(
    raw: &Value,
    experiment_id: &str,
    options: &ManifestOptions<'_>,
) -> Result<ExperimentConfig> {
    let settings = fold_settings(table_rows(raw, "settings").unwrap_or_default());
    let audience = settings
        .get("Audience")
        .ok_or_else(|| ResolveError::malformed("settings missing 'Audience'"))?;
    let status = settings
        .get("Status")
        .ok_or_else(|| ResolveError::malformed("settings missing 'Status'"))?;

    let rows = table_rows(raw, "experiences")
        .ok_or_else(|| ResolveError::malformed("missing 'experiences' table"))?;
    let columns = variant_columns(rows)?;
    let variant_names = ordered_variant_names(&columns);
    let drafts = collect_attributes(rows, &columns);

    let variants = build_variants(&variant_names, drafts);
    let has_usable_challenger = variant_names.iter().skip(1).any(|name| {
        variants
            .get(name)
            .is_some_and(|v| !v.pages.is_empty() || !v.blocks.is_empty())
    });
    if !has_usable_challenger {
        return Err(ResolveError::malformed(
            "no challenger variant declares pages or blocks",
        ));
    }

    let experiment_name = settings.get("Experiment Name").cloned();
    let label = settings
        .get("Label")
        .or(experiment_name.as_ref())
        .cloned()
        .unwrap_or_else(|| experiment_id.to_string());

    Ok(ExperimentConfig {
        id: experiment_id.to_string(),
        experiment_name,
        label,
        audience: audience.trim().to_string(),
        status: Status::parse(status),
        base_path: options.experiment_base_path(experiment_id),
        manifest: Some(options.manifest_location(experiment_id)),
        variant_names,
        variants,
    })
}

/// Split a cell holding a comma- or line-separated list into trimmed tokens.
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Attribute {
    Label,
    PercentageSplit,
    Pages,
    Blocks,
    Other(String),
}

impl Attribute {
    fn from_row_name(name: &str) -> Self {
        match to_camel_case(name).as_str() {
            "label" => Attribute::Label,
            "percentageSplit" | "split" => Attribute::PercentageSplit,
            "pages" | "page" | "url" | "urls" => Attribute::Pages,
            "blocks" | "block" => Attribute::Blocks,
            other => Attribute::Other(other.to_string()),
        }
    }
}

/// One variant column: the raw header as written and its normalized id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    header: String,
    id: String,
}

#[derive(Debug, Default)]
struct VariantDraft {
    label: Option<String>,
    percentage_split: Option<String>,
    pages: Vec<String>,
    blocks: Vec<String>,
}

fn table_rows<'a>(raw: &'a Value, table: &str) -> Option<&'a [Value]> {
    raw.get(table)?
        .get("data")?
        .as_array()
        .map(Vec::as_slice)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn row_name(row: &Value) -> String {
    row.get(NAME_COLUMN)
        .and_then(cell_text)
        .map(|name| name.trim().to_string())
        .unwrap_or_default()
}

fn fold_settings(rows: &[Value]) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    for row in rows {
        let name = row_name(row);
        if name.is_empty() {
            continue;
        }
        let value = row.get(VALUE_COLUMN).and_then(cell_text).unwrap_or_default();
        settings.insert(name, value);
    }
    settings
}

/// Phase one: every non-`Name` header, in first-encountered order.
fn variant_columns(rows: &[Value]) -> Result<Vec<Column>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        let Some(object) = row.as_object() else {
            return Err(ResolveError::malformed("experiences row is not an object"));
        };
        for header in object.keys() {
            if header == NAME_COLUMN || !seen.insert(header.clone()) {
                continue;
            }
            let id = to_class_name(header);
            if id.is_empty() {
                continue;
            }
            columns.push(Column {
                header: header.clone(),
                id,
            });
        }
    }

    if !columns.iter().any(|column| column.id == CONTROL) {
        return Err(ResolveError::malformed("experiences table has no control column"));
    }
    if !columns.iter().any(|column| column.id != CONTROL) {
        return Err(ResolveError::malformed(
            "experiences table has no challenger column",
        ));
    }
    Ok(columns)
}

/// Control first, then challengers in column order, without duplicates.
fn ordered_variant_names(columns: &[Column]) -> Vec<String> {
    let mut names = vec![CONTROL.to_string()];
    for column in columns {
        if !names.contains(&column.id) {
            names.push(column.id.clone());
        }
    }
    names
}

/// Phase two: map attribute rows onto the fixed column set.
fn collect_attributes(rows: &[Value], columns: &[Column]) -> BTreeMap<String, VariantDraft> {
    let mut drafts: BTreeMap<String, VariantDraft> = BTreeMap::new();
    let mut current: Option<Attribute> = None;

    for row in rows {
        let name = row_name(row);
        if !name.is_empty() {
            current = Some(Attribute::from_row_name(&name));
        }
        let Some(attribute) = current.as_ref() else {
            continue;
        };
        if matches!(attribute, Attribute::Other(_)) {
            continue;
        }

        for column in columns {
            let Some(cell) = row.get(&column.header).and_then(cell_text) else {
                continue;
            };
            let draft = drafts.entry(column.id.clone()).or_default();
            match attribute {
                Attribute::Label => {
                    let label = cell.trim();
                    if !label.is_empty() {
                        draft.label = Some(label.to_string());
                    }
                }
                Attribute::PercentageSplit => draft.percentage_split = Some(cell),
                Attribute::Pages => {
                    draft
                        .pages
                        .extend(split_list(&cell).iter().map(|page| path_of(page)));
                }
                Attribute::Blocks => draft.blocks.extend(split_list(&cell)),
                Attribute::Other(_) => {}
            }
        }
    }

    drafts
}

fn build_variants(
    variant_names: &[String],
    mut drafts: BTreeMap<String, VariantDraft>,
) -> BTreeMap<String, Variant> {
    variant_names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let draft = drafts.remove(name).unwrap_or_default();
            let is_control = idx == 0;
            let label = draft.label.unwrap_or_else(|| {
                if is_control {
                    "Control".to_string()
                } else {
                    format!("Challenger {idx}")
                }
            });
            let percentage_split = if is_control {
                String::new()
            } else {
                draft.percentage_split.unwrap_or_default()
            };
            let variant = Variant {
                label,
                percentage_split,
                pages: draft.pages,
                blocks: draft.blocks,
            };
            (name.clone(), variant)
        })
        .collect()
}
