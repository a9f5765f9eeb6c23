//! Feature normalization: raw provider map → fixed-order model vector.
//!
//! Resolution runs in a fixed order so that identical inputs always produce
//! identical vectors:
//! 1. canonical keys are taken as-is (keys are sorted, first writer wins)
//! 2. raw keys are resolved through the alias table, first writer wins
//! 3. booleans and handedness are coerced to 1.0 / 0.0
//! 4. fallback chains fill ambiguous fields from the first non-null source
//! 5. each schema position takes its resolved value or the declared default
//! 6. NaN / Inf are replaced with the declared default

use std::collections::BTreeMap;

use super::aliases::AliasTable;
use super::names::IS_LEFTY;
use super::schema::FeatureSchema;
use crate::domain::{FeatureSet, FeatureValue};
use crate::error::{KpropError, Result};

/// Canonical-name view of a feature set (steps 1-4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFeatures {
    values: BTreeMap<String, f64>,
}

impl ResolvedFeatures {
    /// Finite value for a canonical name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn set_if_absent(&mut self, name: &str, value: f64) -> bool {
        if self.values.contains_key(name) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }
}

/// Model-ready vector plus bookkeeping for confidence scoring
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVector {
    pub values: Vec<f64>,
    /// Schema features that fell back to their default
    pub defaulted: Vec<String>,
    /// Percentage of schema features supplied by the feature set
    pub coverage: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    table: AliasTable,
}

impl FeatureNormalizer {
    pub fn new(table: AliasTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Map raw keys onto canonical names (schema independent).
    pub fn resolve(&self, features: &FeatureSet) -> ResolvedFeatures {
        let mut resolved = ResolvedFeatures::default();

        // 1. canonical keys
        for (key, value) in features.iter() {
            if self.table.is_raw_alias(key) {
                continue;
            }
            if let Some(v) = self.coerce(key, value) {
                resolved.set_if_absent(key, v);
            }
        }

        // 2. aliases, in table order; a non-finite value never blocks an alias
        for (raw, canonical) in self.table.aliases {
            if resolved.contains(canonical) {
                continue;
            }
            if let Some(v) = features.get(raw).and_then(|value| self.coerce(canonical, value)) {
                resolved.values.insert(canonical.to_string(), v);
            }
        }

        // 3. handedness text → is_lefty
        if !resolved.contains(IS_LEFTY) {
            let hand = self
                .table
                .handedness_sources
                .iter()
                .find_map(|src| features.get(src).and_then(parse_handedness));
            if let Some(is_lefty) = hand {
                resolved.values.insert(IS_LEFTY.to_string(), is_lefty);
            }
        }

        // 4. fallback chains
        for (target, chain) in self.table.fallback_chains {
            if resolved.contains(target) {
                continue;
            }
            let candidate = chain.iter().find_map(|source| {
                resolved
                    .get(source.name)
                    .or_else(|| features.number(source.name))
                    .map(|v| v * source.scale)
            });
            if let Some(v) = candidate {
                // a non-finite canonical value does not block its fallback
                resolved.values.insert(target.to_string(), v);
            }
        }

        resolved
    }

    /// Build the model vector for `schema` (steps 5-6).
    pub fn vectorize(
        &self,
        resolved: &ResolvedFeatures,
        schema: &FeatureSchema,
    ) -> Result<NormalizedVector> {
        if schema.is_empty() {
            return Err(KpropError::FeatureNormalization(
                "feature schema unavailable (model not loaded)".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(schema.len());
        let mut defaulted = Vec::new();
        for spec in schema.features() {
            match resolved.get(&spec.name) {
                Some(v) => values.push(v),
                None => {
                    values.push(spec.default);
                    defaulted.push(spec.name.clone());
                }
            }
        }

        // Defaults are validated finite when the schema is built; this pass
        // covers anything that slipped past resolution.
        for (value, spec) in values.iter_mut().zip(schema.features()) {
            if !value.is_finite() {
                *value = spec.default;
            }
        }

        let supplied = schema.len() - defaulted.len();
        let coverage = supplied as f64 / schema.len() as f64 * 100.0;

        Ok(NormalizedVector {
            values,
            defaulted,
            coverage,
        })
    }

    /// `resolve` + `vectorize`
    pub fn normalize(&self, features: &FeatureSet, schema: &FeatureSchema) -> Result<NormalizedVector> {
        let resolved = self.resolve(features);
        self.vectorize(&resolved, schema)
    }

    fn coerce(&self, canonical: &str, value: &FeatureValue) -> Option<f64> {
        if self.table.is_boolean(canonical) {
            coerce_bool(value)
        } else {
            value.as_f64()
        }
    }
}

fn coerce_bool(value: &FeatureValue) -> Option<f64> {
    let b = match value {
        FeatureValue::Bool(b) => *b,
        FeatureValue::Number(n) if n.is_finite() => *n != 0.0,
        FeatureValue::Number(_) => return None,
        FeatureValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "t" | "1" => true,
            "false" | "no" | "n" | "f" | "0" => false,
            _ => return None,
        },
    };
    Some(if b { 1.0 } else { 0.0 })
}

fn parse_handedness(value: &FeatureValue) -> Option<f64> {
    let text = value.as_text()?.trim().to_ascii_uppercase();
    match text.as_str() {
        "L" | "LHP" | "LEFT" => Some(1.0),
        "R" | "RHP" | "RIGHT" => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::names::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::from_pairs(&[
            (K_AVG_SEASON, 5.0),
            (SWSTR_PCT, 0.11),
            (OPPONENT_K_RATE, 0.22),
            (DAYS_REST, 5.0),
            (IS_HOME, 0.0),
            (IS_LEFTY, 0.0),
            ("umpire_k_rate", 0.2),
        ])
        .unwrap()
    }

    #[test]
    fn canonical_keys_beat_aliases() {
        let features = FeatureSet::new()
            .with(DAYS_REST, 6.0)
            .with("rest_days", 3.0)
            .with("days_since_last_start", 4.0);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[3], 6.0);
    }

    #[test]
    fn non_finite_canonical_value_yields_to_alias() {
        let features = FeatureSet::new()
            .with(K_AVG_SEASON, f64::NAN)
            .with("season_k_avg", 6.4);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[0], 6.4);
        assert!(!v.defaulted.iter().any(|name| name == K_AVG_SEASON));
    }

    #[test]
    fn first_alias_in_table_order_wins() {
        // "rest_days" precedes "days_since_last_start" in the table
        let features = FeatureSet::new()
            .with("days_since_last_start", 4.0)
            .with("rest_days", 3.0);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[3], 3.0);
    }

    #[test]
    fn booleans_and_handedness_are_coerced() {
        let features = FeatureSet::new().with("home_game", "yes").with("throws", "L");
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[4], 1.0);
        assert_eq!(v.values[5], 1.0);

        let features = FeatureSet::new().with(IS_HOME, 0.0).with("pitcher_hand", "RHP");
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[4], 0.0);
        assert_eq!(v.values[5], 0.0);
    }

    #[test]
    fn fallback_chain_takes_first_non_null() {
        let features = FeatureSet::new()
            .with_null("swstr_pct_last_5")
            .with("swstr_pct_season", 0.135)
            .with("whiff_pct", 0.30);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values[1], 0.135);

        let proxy_only = FeatureSet::new().with("whiff_pct", 0.30);
        let v = FeatureNormalizer::default().normalize(&proxy_only, &schema()).unwrap();
        assert!((v.values[1] - 0.135).abs() < 1e-12);
    }

    #[test]
    fn season_average_proxied_from_k_per_9() {
        let features = FeatureSet::new().with("K/9", 10.0);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert!((v.values[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn missing_and_non_finite_use_defaults() {
        let features = FeatureSet::new()
            .with(K_AVG_SEASON, f64::NAN)
            .with("park_factor_k", f64::INFINITY)
            .with("umpire_k_rate", f64::NEG_INFINITY);
        let v = FeatureNormalizer::default().normalize(&features, &schema()).unwrap();
        assert_eq!(v.values, vec![5.0, 0.11, 0.22, 5.0, 0.0, 0.0, 0.2]);
        assert_eq!(v.coverage, 0.0);
        assert_eq!(v.defaulted.len(), 7);
    }

    #[test]
    fn output_matches_schema_and_is_deterministic() {
        let features = FeatureSet::new()
            .with("season_k_avg", 6.4)
            .with("SwStr%", 0.128)
            .with("opp_k_pct", 0.245)
            .with("home", true)
            .with("unrelated_column", 42.0)
            .with("notes", "left early last start");

        let normalizer = FeatureNormalizer::default();
        let schema = schema();
        let a = normalizer.normalize(&features, &schema).unwrap();
        let b = normalizer.normalize(&features.clone(), &schema).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.values.len(), schema.len());
        assert!(a.values.iter().all(|v| v.is_finite()));
        assert_eq!(a.values[0], 6.4);
        assert_eq!(a.values[1], 0.128);
        assert_eq!(a.values[2], 0.245);
        assert_eq!(a.values[4], 1.0);
        assert!((a.coverage - 4.0 / 7.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_schema_is_an_error() {
        let err = FeatureNormalizer::default()
            .normalize(&FeatureSet::new(), &FeatureSchema::default())
            .unwrap_err();
        assert!(matches!(err, KpropError::FeatureNormalization(_)));
    }
}
