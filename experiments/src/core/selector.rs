//! Weighted variant selection.
//!
//! Randomness is supplied by the caller as `roll ∈ [0, 1)`, so selection is
//! deterministic for a given roll.

use crate::core::types::{CONTROL, ExperimentConfig};

/// Traffic weight per variant, in `variant_names` order.
///
/// Challengers use their parsed `percentage_split` (unparseable or negative
/// values count as zero). Control takes whatever share is left.
pub fn allocation(config: &ExperimentConfig) -> Vec<(String, f64)> {
    let mut weights: Vec<(String, f64)> = config
        .variant_names
        .iter()
        .skip(1)
        .map(|name| {
            let weight = config
                .variants
                .get(name)
                .and_then(|variant| variant.percentage_split.trim().parse::<f64>().ok())
                .filter(|weight| weight.is_finite() && *weight > 0.0)
                .unwrap_or(0.0);
            (name.clone(), weight)
        })
        .collect();
    let assigned: f64 = weights.iter().map(|(_, weight)| weight).sum();
    let control = config
        .variant_names
        .first()
        .cloned()
        .unwrap_or_else(|| CONTROL.to_string());
    weights.insert(0, (control, (1.0 - assigned).max(0.0)));
    weights
}

/// Pick the variant whose cumulative weight first exceeds `roll`.
///
/// Falls back to control when the weights do not cover `roll`.
pub fn select_variant(config: &ExperimentConfig, roll: f64) -> String {
    let weights = allocation(config);
    let mut cumulative = 0.0;
    for (name, weight) in &weights {
        cumulative += weight;
        if *weight > 0.0 && roll < cumulative {
            return name.clone();
        }
    }
    weights
        .into_iter()
        .next()
        .map(|(name, _)| name)
        .unwrap_or_else(|| CONTROL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instant::build_instant_config;
    use crate::test_support::manifest_options;

    fn three_way() -> ExperimentConfig {
        build_instant_config("promo", "/b,/c", &manifest_options(), "/a")
    }

    #[test]
    fn control_absorbs_rounding_remainder() {
        let weights = allocation(&three_way());
        assert_eq!(weights[0].0, "control");
        assert!((weights[0].1 - 0.34).abs() < 1e-9);
        assert_eq!(weights[1], ("challenger-1".to_string(), 0.33));
        assert_eq!(weights[2], ("challenger-2".to_string(), 0.33));
    }

    #[test]
    fn roll_walks_cumulative_weights() {
        let config = three_way();
        assert_eq!(select_variant(&config, 0.0), "control");
        assert_eq!(select_variant(&config, 0.339), "control");
        assert_eq!(select_variant(&config, 0.35), "challenger-1");
        assert_eq!(select_variant(&config, 0.99), "challenger-2");
    }

    #[test]
    fn oversubscribed_splits_starve_control() {
        let mut config = three_way();
        for name in ["challenger-1", "challenger-2"] {
            config.variants.get_mut(name).expect("variant").percentage_split = "0.6".to_string();
        }
        let weights = allocation(&config);
        assert_eq!(weights[0].1, 0.0);
        assert_eq!(select_variant(&config, 0.1), "challenger-1");
        assert_eq!(select_variant(&config, 0.7), "challenger-2");
    }

    #[test]
    fn unparseable_split_counts_as_zero() {
        let mut config = three_way();
        config
            .variants
            .get_mut("challenger-1")
            .expect("variant")
            .percentage_split = "half".to_string();
        assert_eq!(select_variant(&config, 0.5), "control");
    }
}
