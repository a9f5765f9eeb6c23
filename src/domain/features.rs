//! Raw per-subject feature bundles as handed over by feature providers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single raw feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value. Booleans map to 1.0/0.0, numeric strings are
    /// parsed. Non-finite numbers are returned as-is; the normalizer sanitizes them.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<i32> for FeatureValue {
    fn from(v: i32) -> Self {
        FeatureValue::Number(f64::from(v))
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

/// String-keyed, nullable feature map for one subject on one date.
///
/// Keys are kept sorted so every iteration over a set is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    values: BTreeMap<String, Option<FeatureValue>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<FeatureValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style explicit null
    pub fn with_null(mut self, name: &str) -> Self {
        self.values.insert(name.to_string(), None);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<FeatureValue>) {
        self.values.insert(name.to_string(), Some(value.into()));
    }

    /// Non-null value for a key
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name).and_then(|v| v.as_ref())
    }

    /// Finite numeric value for a key
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name)
            .and_then(FeatureValue::as_f64)
            .filter(|v| v.is_finite())
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

    /// Iterate over keys with non-null values, in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }
}

impl<K: Into<String>> FromIterator<(K, FeatureValue)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (K, FeatureValue)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mixed_json_map() {
        let json = r#"{"k_avg_season": 6.2, "is_home": true, "throws": "L", "days_rest": null}"#;
        let set: FeatureSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.number("k_avg_season"), Some(6.2));
        assert_eq!(set.number("is_home"), Some(1.0));
        assert_eq!(set.get("throws").and_then(|v| v.as_text()), Some("L"));
        assert!(!set.contains("days_rest"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn number_rejects_non_finite_and_parses_text() {
        let set = FeatureSet::new()
            .with("bad", f64::NAN)
            .with("text_num", "5.5")
            .with("word", "ace");
        assert_eq!(set.number("bad"), None);
        assert_eq!(set.number("text_num"), Some(5.5));
        assert_eq!(set.number("word"), None);
    }
}
