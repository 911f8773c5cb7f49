//! Inline experiments declared as a comma-separated list of variant URLs.

use std::collections::BTreeMap;

use crate::core::manifest::ManifestOptions;
use crate::core::types::{CONTROL, ExperimentConfig, Status, Variant};

/// Build a config for an instant experiment without fetching a manifest.
///
/// Each trimmed token of `variant_urls` becomes the sole page of one
/// challenger, stored exactly as written. Challengers get an even split of
/// `1 / (n + 1)` rounded to two decimals; the rounding remainder is left to
/// control, so three-way splits read `"0.33"` each.
pub fn build_instant_config(
    experiment_id: &str,
    variant_urls: &str,
    options: &ManifestOptions<'_>,
    page_path: &str,
) -> ExperimentConfig {
    let pages: Vec<String> = variant_urls
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    let even_split = format!("{:.2}", 1.0 / (pages.len() as f64 + 1.0));

    let mut variant_names = Vec::with_capacity(pages.len() + 1);
    let mut variants = BTreeMap::new();

    variant_names.push(CONTROL.to_string());
    variants.insert(
        CONTROL.to_string(),
        Variant {
            label: "Control".to_string(),
            percentage_split: String::new(),
            pages: vec![page_path.to_string()],
            blocks: Vec::new(),
        },
    );

    for (idx, page) in pages.into_iter().enumerate() {
        let name = format!("challenger-{}", idx + 1);
        variants.insert(
            name.clone(),
            Variant {
                label: format!("Challenger {}", idx + 1),
                percentage_split: even_split.clone(),
                pages: vec![page],
                blocks: Vec::new(),
            },
        );
        variant_names.push(name);
    }

    ExperimentConfig {
        id: experiment_id.to_string(),
        experiment_name: None,
        label: format!("Instant Experiment: {experiment_id}"),
        audience: String::new(),
        status: Status::Active,
        base_path: options.experiment_base_path(experiment_id),
        manifest: None,
        variant_names,
        variants,
    }
}
