//! Feature provider seam.
//!
//! Feature engineering happens upstream; the core only asks for the bundle
//! of one subject on one date. `None` means "cannot predict" and the caller
//! decides what to do with that.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::FeatureSet;
use crate::error::{KpropError, Result};

#[async_trait]
pub trait FeatureProvider: Send + Sync {
    async fn get_features(&self, subject_id: &str, as_of: NaiveDate) -> Result<Option<FeatureSet>>;
}

/// Reads `<root>/<YYYY-MM-DD>/<subject_id>.json` exports
#[derive(Debug, Clone)]
pub struct JsonDirFeatureProvider {
    root: PathBuf,
}

impl JsonDirFeatureProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, subject_id: &str, as_of: NaiveDate) -> PathBuf {
        self.root
            .join(as_of.format("%Y-%m-%d").to_string())
            .join(format!("{subject_id}.json"))
    }
}

#[async_trait]
impl FeatureProvider for JsonDirFeatureProvider {
    async fn get_features(&self, subject_id: &str, as_of: NaiveDate) -> Result<Option<FeatureSet>> {
        if subject_id.contains(|c: char| c == '/' || c == '\\') || subject_id.contains("..") {
            return Err(KpropError::Validation(format!(
                "invalid subject id: {subject_id}"
            )));
        }

        let path = self.path_for(subject_id, as_of);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No feature export at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let features: FeatureSet = serde_json::from_str(&content)?;
        Ok(Some(features))
    }
}

/// Fixed in-memory feature sets keyed by (subject, date)
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureProvider {
    sets: HashMap<(String, NaiveDate), FeatureSet>,
}

impl InMemoryFeatureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subject_id: &str, as_of: NaiveDate, features: FeatureSet) {
        self.sets.insert((subject_id.to_string(), as_of), features);
    }
}

#[async_trait]
impl FeatureProvider for InMemoryFeatureProvider {
    async fn get_features(&self, subject_id: &str, as_of: NaiveDate) -> Result<Option<FeatureSet>> {
        Ok(self.sets.get(&(subject_id.to_string(), as_of)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[tokio::test]
    async fn json_dir_reads_exports_and_reports_missing() {
        let root = std::env::temp_dir().join(format!("kprop_features_{}", std::process::id()));
        let day = root.join("2024-06-14");
        std::fs::create_dir_all(&day).unwrap();
        std::fs::write(day.join("543037.json"), r#"{"k_avg_season": 7.1, "gs": 14}"#).unwrap();

        let provider = JsonDirFeatureProvider::new(&root);
        let set = provider.get_features("543037", date()).await.unwrap().unwrap();
        assert_eq!(set.number("k_avg_season"), Some(7.1));
        assert!(provider.get_features("000000", date()).await.unwrap().is_none());
        assert!(provider.get_features("../etc", date()).await.is_err());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn in_memory_lookup() {
        let mut provider = InMemoryFeatureProvider::new();
        provider.insert("1", date(), FeatureSet::new().with("k_avg_season", 5.5));
        assert!(provider.get_features("1", date()).await.unwrap().is_some());
        assert!(provider.get_features("2", date()).await.unwrap().is_none());
    }
}
