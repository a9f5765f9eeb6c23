//! Long-lived prediction service.
//!
//! Owns the model cache, roster provider, red-flag policy and configuration
//! for the lifetime of the process. Batch calls fan out across subjects
//! with bounded concurrency; results come back in request order.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{EnsembleResult, PredictionRequest, PredictionResult};
use crate::error::{KpropError, Result};
use crate::features::{FeatureProvider, FeatureSchema};
use crate::model::{store_from_config, ModelArtifactStore, ModelCache};
use crate::predictor::{EnsembleCombiner, PredictionContext, SinglePredictor};
use crate::red_flags::RedFlagPolicy;
use crate::roster::{roster_from_config, RosterStatusProvider};
use crate::scoring::ConfidenceScorer;

/// One subject on a slate, before features are fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlateEntry {
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub line: Option<f64>,
}

pub struct PredictionService {
    config: AppConfig,
    context: Arc<PredictionContext>,
    ensemble: EnsembleCombiner,
}

impl PredictionService {
    /// Build the store and roster provider described by `config`
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn ModelArtifactStore> = Arc::from(store_from_config(&config.store)?);
        let roster = roster_from_config(&config.roster)?;
        Self::new(config, store, roster)
    }

    pub fn new(
        config: AppConfig,
        store: Arc<dyn ModelArtifactStore>,
        roster: Arc<dyn RosterStatusProvider>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| KpropError::InvalidConfig(errors.join("; ")))?;

        let cache = Arc::new(ModelCache::new(
            store,
            Duration::from_millis(config.store.fetch_timeout_ms),
        ));
        let context = Arc::new(PredictionContext::new(
            cache,
            ConfidenceScorer::new(config.confidence.clone()),
            RedFlagPolicy::from_config(&config.red_flags),
            roster,
        ));

        let components = config
            .ensemble
            .components
            .iter()
            .map(|c| {
                predictor_for(&config, &context, &c.model_id).map(|p| (p, c.weight))
            })
            .collect::<Result<Vec<_>>>()?;
        let ensemble = EnsembleCombiner::new(components, config.ensemble.clone(), context.clone())?;

        info!(
            models = config.models.len(),
            default_model = %config.default_model,
            ensemble = ?ensemble.component_ids(),
            "prediction service ready"
        );

        Ok(Self {
            config,
            context,
            ensemble,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModelCache {
        &self.context.cache
    }

    pub fn predictor(&self, model_id: &str) -> Result<SinglePredictor> {
        predictor_for(&self.config, &self.context, model_id)
    }

    /// Predict with `model_id`, or the default model when `None`
    pub async fn predict(&self, model_id: Option<&str>, request: &PredictionRequest) -> PredictionResult {
        let model_id = model_id.unwrap_or(self.config.default_model.as_str());
        match self.predictor(model_id) {
            Ok(predictor) => predictor.predict(request).await,
            Err(e) => PredictionResult::error(&request.subject_id, model_id, request.line, e.to_string()),
        }
    }

    pub async fn predict_ensemble(&self, request: &PredictionRequest) -> EnsembleResult {
        self.ensemble.predict(request).await
    }

    pub async fn predict_batch(
        &self,
        model_id: Option<&str>,
        requests: Vec<PredictionRequest>,
    ) -> Vec<PredictionResult> {
        let limit = self.config.worker.max_concurrency.max(1);
        let mut indexed: Vec<(usize, PredictionResult)> = stream::iter(requests.into_iter().enumerate())
            .map(|(i, request)| async move { (i, self.predict(model_id, &request).await) })
            .buffer_unordered(limit)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, r)| r).collect()
    }

    pub async fn predict_ensemble_batch(&self, requests: Vec<PredictionRequest>) -> Vec<EnsembleResult> {
        let limit = self.config.worker.max_concurrency.max(1);
        let mut indexed: Vec<(usize, EnsembleResult)> = stream::iter(requests.into_iter().enumerate())
            .map(|(i, request)| async move { (i, self.predict_ensemble(&request).await) })
            .buffer_unordered(limit)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, r)| r).collect()
    }

    /// Pull features for each slate entry, then predict.
    ///
    /// A subject with no features (or a failed fetch) gets an ERROR result.
    pub async fn predict_from_provider(
        &self,
        provider: &dyn FeatureProvider,
        model_id: Option<&str>,
        slate: &[SlateEntry],
        as_of: NaiveDate,
    ) -> Vec<PredictionResult> {
        let model = model_id.unwrap_or(self.config.default_model.as_str());
        let limit = self.config.worker.max_concurrency.max(1);

        let mut indexed: Vec<(usize, PredictionResult)> = stream::iter(slate.iter().enumerate())
            .map(|(i, entry)| async move {
                let result = match provider.get_features(&entry.subject_id, as_of).await {
                    Ok(Some(features)) => {
                        let request = PredictionRequest {
                            subject_id: entry.subject_id.clone(),
                            subject_name: entry.subject_name.clone(),
                            features,
                            line: entry.line,
                        };
                        self.predict(Some(model), &request).await
                    }
                    Ok(None) => PredictionResult::error(
                        &entry.subject_id,
                        model,
                        entry.line,
                        "features unavailable",
                    ),
                    Err(e) => {
                        warn!(subject = %entry.subject_id, error = %e, "feature fetch failed");
                        PredictionResult::error(&entry.subject_id, model, entry.line, e.to_string())
                    }
                };
                (i, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, r)| r).collect()
    }

    /// Ensemble counterpart of [`predict_from_provider`](Self::predict_from_provider)
    pub async fn predict_ensemble_from_provider(
        &self,
        provider: &dyn FeatureProvider,
        slate: &[SlateEntry],
        as_of: NaiveDate,
    ) -> Vec<EnsembleResult> {
        let limit = self.config.worker.max_concurrency.max(1);

        let mut indexed: Vec<(usize, EnsembleResult)> = stream::iter(slate.iter().enumerate())
            .map(|(i, entry)| async move {
                let result = match provider.get_features(&entry.subject_id, as_of).await {
                    Ok(Some(features)) => {
                        let request = PredictionRequest {
                            subject_id: entry.subject_id.clone(),
                            subject_name: entry.subject_name.clone(),
                            features,
                            line: entry.line,
                        };
                        self.predict_ensemble(&request).await
                    }
                    Ok(None) => {
                        EnsembleResult::error(&entry.subject_id, entry.line, "features unavailable")
                    }
                    Err(e) => {
                        warn!(subject = %entry.subject_id, error = %e, "feature fetch failed");
                        EnsembleResult::error(&entry.subject_id, entry.line, e.to_string())
                    }
                };
                (i, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, r)| r).collect()
    }

    /// Schema of a configured model (loads it if needed)
    pub async fn schema(&self, model_id: &str) -> Result<FeatureSchema> {
        if self.config.calibration(model_id).is_none() {
            return Err(KpropError::ModelNotConfigured(model_id.to_string()));
        }
        Ok(self.context.cache.get(model_id).await?.schema.clone())
    }

    /// Load every configured model; returns the ids that failed
    pub async fn warm_up(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for model_id in self.config.models.keys() {
            if let Err(e) = self.context.cache.get(model_id).await {
                warn!(model_id = %model_id, error = %e, "warm-up load failed");
                failed.push(model_id.clone());
            }
        }
        info!(
            loaded = self.context.cache.loaded_ids().len(),
            failed = failed.len(),
            "model warm-up finished"
        );
        failed
    }
}

fn predictor_for(
    config: &AppConfig,
    context: &Arc<PredictionContext>,
    model_id: &str,
) -> Result<SinglePredictor> {
    let calibration = config
        .calibration(model_id)
        .ok_or_else(|| KpropError::ModelNotConfigured(model_id.to_string()))?;
    Ok(SinglePredictor::new(model_id, calibration.clone(), context.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelCalibration;
    use crate::domain::{FeatureSet, Recommendation};
    use crate::features::names::*;
    use crate::features::InMemoryFeatureProvider;
    use crate::model::artifact::fixtures;
    use crate::model::InMemoryArtifactStore;
    use crate::predictor::EnsembleComponent;
    use crate::roster::{RosterStatusCache, StaticRosterFeed};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.models.clear();
        config.models.insert("reg_a".into(), ModelCalibration::default());
        config.models.insert("reg_b".into(), ModelCalibration::default());
        config.default_model = "reg_a".into();
        config.ensemble.components = vec![
            EnsembleComponent {
                model_id: "reg_a".into(),
                weight: 0.5,
            },
            EnsembleComponent {
                model_id: "reg_b".into(),
                weight: 0.5,
            },
        ];
        config.worker.max_concurrency = 2;
        config
    }

    fn service() -> PredictionService {
        let mut store = InMemoryArtifactStore::new();
        store.insert_json("reg_a", &fixtures::regressor_doc("reg_a")).unwrap();
        store.insert_json("reg_b", &fixtures::regressor_doc("reg_b")).unwrap();
        let roster = RosterStatusCache::new(
            Arc::new(StaticRosterFeed::new(["Scratched Starter"])),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        PredictionService::new(config(), Arc::new(store), Arc::new(roster)).unwrap()
    }

    fn features(k_avg: f64) -> FeatureSet {
        FeatureSet::new()
            .with(K_AVG_SEASON, k_avg)
            .with(GAMES_STARTED_SEASON, 10.0)
            .with(CAREER_STARTS, 50.0)
            .with(DATA_COMPLETENESS_SCORE, 90.0)
            .with(ROLLING_GAMES_COUNT, 10.0)
    }

    #[tokio::test]
    async fn batch_preserves_request_order() {
        let service = service();
        let requests: Vec<PredictionRequest> = (0..6)
            .map(|i| PredictionRequest::new(&format!("p{i}"), features(4.0 + i as f64), Some(6.5)))
            .collect();

        let results = service.predict_batch(None, requests).await;
        let ids: Vec<&str> = results.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5"]);
        assert_eq!(results[0].recommendation, Recommendation::Under);
        assert_eq!(results[5].recommendation, Recommendation::Over);
    }

    #[tokio::test]
    async fn unconfigured_model_is_error_result() {
        let service = service();
        let request = PredictionRequest::new("p", features(7.0), Some(6.5));
        let result = service.predict(Some("k_regressor_v9"), &request).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn roster_unavailable_skips() {
        let service = service();
        let request =
            PredictionRequest::new("p", features(8.0), Some(6.5)).with_name("scratched starter");
        let result = service.predict(None, &request).await;
        assert_eq!(result.recommendation, Recommendation::Skip);

        let ensemble = service.predict_ensemble(&request).await;
        assert_eq!(ensemble.recommendation, Recommendation::Skip);
    }

    #[tokio::test]
    async fn provider_gaps_become_error_results() {
        let service = service();
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let mut provider = InMemoryFeatureProvider::new();
        provider.insert("have", date, features(7.5));

        let slate = vec![
            SlateEntry {
                subject_id: "have".into(),
                subject_name: None,
                line: Some(6.5),
            },
            SlateEntry {
                subject_id: "missing".into(),
                subject_name: None,
                line: Some(6.5),
            },
        ];
        let results = service.predict_from_provider(&provider, None, &slate, date).await;
        assert_eq!(results[0].recommendation, Recommendation::Over);
        assert!(results[1].is_error());
        assert_eq!(results[1].error.as_deref(), Some("features unavailable"));
    }

    #[tokio::test]
    async fn ensemble_slate_keeps_every_subject() {
        let service = service();
        let dir = std::env::temp_dir().join(format!("kprop-ensemble-slate-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let day_dir = dir.join("2024-07-04");
        std::fs::create_dir_all(&day_dir).unwrap();
        std::fs::write(
            day_dir.join("good.json"),
            serde_json::to_vec(&features(7.5)).unwrap(),
        )
        .unwrap();
        std::fs::write(day_dir.join("bad.json"), b"{ not json").unwrap();

        let slate: Vec<SlateEntry> = ["good", "missing", "bad"]
            .iter()
            .map(|id| SlateEntry {
                subject_id: id.to_string(),
                subject_name: None,
                line: Some(6.5),
            })
            .collect();
        let provider = crate::features::JsonDirFeatureProvider::new(&dir);
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let results = service
            .predict_ensemble_from_provider(&provider, &slate, date)
            .await;

        let ids: Vec<&str> = results.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["good", "missing", "bad"]);
        assert_eq!(results[0].recommendation, Recommendation::Over);
        assert!(results[1].is_error());
        assert_eq!(results[1].error.as_deref(), Some("features unavailable"));
        assert_eq!(results[1].line, Some(6.5));
        assert!(results[2].is_error());
        assert!(results[2].predicted_value.is_none());
    }

    #[tokio::test]
    async fn warm_up_reports_failures() {
        let mut config = config();
        config.models.insert("absent".into(), ModelCalibration::default());
        let mut store = InMemoryArtifactStore::new();
        store.insert_json("reg_a", &fixtures::regressor_doc("reg_a")).unwrap();
        store.insert_json("reg_b", &fixtures::regressor_doc("reg_b")).unwrap();
        let service =
            PredictionService::new(config, Arc::new(store), Arc::new(crate::roster::NoRosterChecks)).unwrap();

        assert_eq!(service.warm_up().await, vec!["absent".to_string()]);
        assert_eq!(service.cache().loaded_ids(), vec!["reg_a".to_string(), "reg_b".to_string()]);
        assert_eq!(service.schema("reg_a").await.unwrap().len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.worker.max_concurrency = 0;
        let result = PredictionService::new(
            config,
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(crate::roster::NoRosterChecks),
        );
        assert!(matches!(result, Err(KpropError::InvalidConfig(_))));
    }
}
