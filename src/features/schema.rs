//! Ordered feature schema carried by every trained artifact.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{KpropError, Result};

/// One schema position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    /// Value used when the feature is missing or non-finite
    #[serde(default)]
    pub default: f64,
}

impl FeatureSpec {
    pub fn new(name: &str, default: f64) -> Self {
        Self {
            name: name.to_string(),
            default,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawSchema {
    #[serde(default)]
    version: Option<String>,
    features: Vec<FeatureSpec>,
}

/// Canonical ordered feature list for one model.
///
/// Position `i` of every vector built for this model holds feature
/// `features[i]`. An empty schema means the model was never loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct FeatureSchema {
    version: Option<String>,
    features: Vec<FeatureSpec>,
}

impl TryFrom<RawSchema> for FeatureSchema {
    type Error = KpropError;

    fn try_from(raw: RawSchema) -> Result<Self> {
        let mut schema = FeatureSchema::new(raw.features)?;
        schema.version = raw.version;
        Ok(schema)
    }
}

impl FeatureSchema {
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self> {
        if features.is_empty() {
            return Err(KpropError::FeatureNormalization(
                "schema has no features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &features {
            if spec.name.trim().is_empty() {
                return Err(KpropError::FeatureNormalization(
                    "schema contains an empty feature name".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(KpropError::FeatureNormalization(format!(
                    "duplicate schema feature: {}",
                    spec.name
                )));
            }
            if !spec.default.is_finite() {
                return Err(KpropError::FeatureNormalization(format!(
                    "non-finite default for {}",
                    spec.name
                )));
            }
        }

        Ok(Self {
            version: None,
            features,
        })
    }

    /// Shorthand for tests and fixtures: `(name, default)` pairs
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|(name, default)| FeatureSpec::new(name, *default))
                .collect(),
        )
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates_and_bad_defaults() {
        assert!(FeatureSchema::from_pairs(&[("a", 0.0), ("a", 1.0)]).is_err());
        assert!(FeatureSchema::from_pairs(&[("a", f64::INFINITY)]).is_err());
        assert!(FeatureSchema::from_pairs(&[]).is_err());
        assert!(FeatureSchema::from_pairs(&[(" ", 0.0)]).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: FeatureSchema = serde_json::from_str(
            r#"{"version": "2024.1", "features": [{"name": "k_avg_season", "default": 5.0}, {"name": "is_home"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.version(), Some("2024.1"));
        assert_eq!(ok.features()[1].default, 0.0);
        assert_eq!(ok.position("is_home"), Some(1));

        let dup = serde_json::from_str::<FeatureSchema>(
            r#"{"features": [{"name": "x"}, {"name": "x"}]}"#,
        );
        assert!(dup.is_err());
    }
}
