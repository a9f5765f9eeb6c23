//! One model version, one subject.
//!
//! LOAD_MODEL → NORMALIZE_FEATURES → SCORE → EVALUATE_RED_FLAGS →
//! FINAL_RECOMMENDATION. Any failure before red-flag evaluation ends at
//! ERROR; a hard skip ends at SKIP. Failures are returned as data, never
//! as `Err`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use super::PredictionContext;
use crate::config::ModelCalibration;
use crate::domain::{PredictionRequest, PredictionResult, Recommendation};
use crate::features::names::{DATA_COMPLETENESS_SCORE, K_STD_LAST_10, ROLLING_GAMES_COUNT};
use crate::features::{NormalizedVector, ResolvedFeatures};
use crate::model::{backend_for, ScoredOutput};
use crate::scoring::{QualitySignals, RecommendationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorState {
    LoadModel,
    NormalizeFeatures,
    Score,
    EvaluateRedFlags,
    FinalRecommendation,
}

impl PredictorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorState::LoadModel => "LOAD_MODEL",
            PredictorState::NormalizeFeatures => "NORMALIZE_FEATURES",
            PredictorState::Score => "SCORE",
            PredictorState::EvaluateRedFlags => "EVALUATE_RED_FLAGS",
            PredictorState::FinalRecommendation => "FINAL_RECOMMENDATION",
        }
    }
}

impl std::fmt::Display for PredictorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone)]
pub struct SinglePredictor {
    model_id: String,
    calibration: ModelCalibration,
    engine: RecommendationEngine,
    context: Arc<PredictionContext>,
}

impl SinglePredictor {
    pub fn new(model_id: &str, calibration: ModelCalibration, context: Arc<PredictionContext>) -> Self {
        Self {
            model_id: model_id.to_string(),
            engine: RecommendationEngine::from_calibration(&calibration),
            calibration,
            context,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn enter(&self, state: PredictorState, subject_id: &str) {
        debug!(subject = subject_id, model = %self.model_id, %state, "predictor state");
    }

    fn fail(&self, request: &PredictionRequest, state: PredictorState, message: String) -> PredictionResult {
        warn!(
            subject = %request.subject_id,
            model = %self.model_id,
            %state,
            error = %message,
            "prediction failed"
        );
        PredictionResult::error(&request.subject_id, &self.model_id, request.line, message)
    }

    pub async fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        let subject = request.subject_id.as_str();

        self.enter(PredictorState::LoadModel, subject);
        let artifact = match self.context.cache.get(&self.model_id).await {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(request, PredictorState::LoadModel, e.to_string()),
        };
        let backend = backend_for(artifact, &self.calibration);

        self.enter(PredictorState::NormalizeFeatures, subject);
        let normalizer = &self.context.normalizer;
        let resolved = normalizer.resolve(&request.features);
        let vector = match normalizer.vectorize(&resolved, backend.schema()) {
            Ok(v) => v,
            Err(e) => return self.fail(request, PredictorState::NormalizeFeatures, e.to_string()),
        };
        if !vector.defaulted.is_empty() {
            debug!(
                subject,
                model = %self.model_id,
                coverage = vector.coverage,
                defaulted = ?vector.defaulted,
                "schema defaults used"
            );
        }

        self.enter(PredictorState::Score, subject);
        let scored = match backend.score(&vector.values, request.line, &resolved) {
            Ok(s) => s,
            Err(e) => return self.fail(request, PredictorState::Score, e.to_string()),
        };
        let confidence = match scored.confidence {
            Some(c) => c.clamp(0.0, 100.0),
            None => self
                .context
                .scorer
                .score(self.calibration.base_confidence, &quality_signals(&resolved, &vector)),
        };
        let generic = self.engine.recommend(scored.value, request.line, confidence);
        let preliminary = scored.decision.unwrap_or(generic.recommendation);

        self.enter(PredictorState::EvaluateRedFlags, subject);
        let unavailable = self.context.roster.is_unavailable(request.roster_key()).await;
        let flags = self.context.policy.evaluate(&resolved, preliminary, unavailable);

        if flags.skip {
            debug!(subject, model = %self.model_id, reason = ?flags.skip_reason, "hard skip");
            return PredictionResult {
                subject_id: request.subject_id.clone(),
                model_version: self.model_id.clone(),
                predicted_value: Some(scored.value),
                line: request.line,
                edge: generic.edge,
                confidence: 0.0,
                recommendation: Recommendation::Skip,
                p_over: scored.p_over,
                confidence_multiplier: flags.multiplier,
                red_flags: flags.flags,
                skip_reason: flags.skip_reason,
                error: None,
                generated_at: Utc::now(),
            };
        }

        self.enter(PredictorState::FinalRecommendation, subject);
        let adjusted = (confidence * flags.multiplier).clamp(0.0, 100.0);
        let decision = self.final_decision(preliminary, &scored, request.line, adjusted);

        debug!(
            subject,
            model = %self.model_id,
            predicted = scored.value,
            confidence = adjusted,
            recommendation = %decision,
            "prediction complete"
        );

        PredictionResult {
            subject_id: request.subject_id.clone(),
            model_version: self.model_id.clone(),
            predicted_value: Some(scored.value),
            line: request.line,
            edge: generic.edge,
            confidence: adjusted,
            recommendation: decision,
            p_over: scored.p_over,
            confidence_multiplier: flags.multiplier,
            red_flags: flags.flags,
            skip_reason: None,
            error: None,
            generated_at: Utc::now(),
        }
    }

    /// Classifier decisions stand as embedded; regressor decisions can only be
    /// downgraded to PASS.
    fn final_decision(
        &self,
        preliminary: Recommendation,
        scored: &ScoredOutput,
        line: Option<f64>,
        adjusted_confidence: f64,
    ) -> Recommendation {
        if scored.decision.is_some() {
            return preliminary;
        }
        self.engine
            .finalize(preliminary, scored.value, line, adjusted_confidence)
            .recommendation
    }
}

fn quality_signals(resolved: &ResolvedFeatures, vector: &NormalizedVector) -> QualitySignals {
    QualitySignals {
        completeness: resolved
            .get(DATA_COMPLETENESS_SCORE)
            .unwrap_or(vector.coverage),
        sample_count: resolved.get(ROLLING_GAMES_COUNT),
        outcome_std: resolved.get(K_STD_LAST_10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeatureSet;
    use crate::features::names::*;
    use crate::predictor::test_support;

    fn clean_features(k_avg: f64) -> FeatureSet {
        FeatureSet::new()
            .with(K_AVG_SEASON, k_avg)
            .with(OPPONENT_K_RATE, 0.22)
            .with(GAMES_STARTED_SEASON, 14.0)
            .with(CAREER_STARTS, 90.0)
            .with(AVG_INNINGS_LAST_5, 5.9)
            .with(DATA_COMPLETENESS_SCORE, 92.0)
            .with(ROLLING_GAMES_COUNT, 10.0)
    }

    fn predictor(model_id: &str) -> SinglePredictor {
        SinglePredictor::new(model_id, ModelCalibration::default(), test_support::context())
    }

    #[tokio::test]
    async fn edge_at_floor_is_over() {
        let request = PredictionRequest::new("592450", clean_features(7.0), Some(6.5));
        let result = predictor("reg_a").predict(&request).await;

        assert_eq!(result.recommendation, Recommendation::Over);
        assert_eq!(result.predicted_value, Some(7.0));
        assert!((result.edge.unwrap() - 0.5).abs() < 1e-12);
        // 70 + 15 (completeness) + 10 (samples)
        assert_eq!(result.confidence, 95.0);
        assert!(result.red_flags.is_empty());
    }

    #[tokio::test]
    async fn thin_edge_is_pass() {
        let request = PredictionRequest::new("592450", clean_features(6.6), Some(6.5));
        let result = predictor("reg_a").predict(&request).await;
        assert_eq!(result.recommendation, Recommendation::Pass);
    }

    #[tokio::test]
    async fn zero_starts_skip_keeps_prediction_for_audit() {
        let features = clean_features(9.0).with(GAMES_STARTED_SEASON, 0.0);
        let request = PredictionRequest::new("683003", features, Some(5.5));
        let result = predictor("reg_a").predict(&request).await;

        assert_eq!(result.recommendation, Recommendation::Skip);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.predicted_value, Some(9.0));
        assert_eq!(result.skip_reason.as_deref(), Some("no starts this season"));
    }

    #[tokio::test]
    async fn unknown_model_is_error_result() {
        let request = PredictionRequest::new("592450", clean_features(7.0), Some(6.5));
        let result = predictor("missing").predict(&request).await;

        assert!(result.is_error());
        assert_eq!(result.predicted_value, None);
        assert!(result.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn soft_boost_never_upgrades_pass() {
        // high variance boosts UNDER only; a PASS stays PASS
        let features = clean_features(6.6).with(K_STD_LAST_10, 4.5);
        let request = PredictionRequest::new("592450", features, Some(6.5));
        let result = predictor("reg_a").predict(&request).await;
        assert_eq!(result.recommendation, Recommendation::Pass);
        assert!(result.red_flags.is_empty());
    }

    #[tokio::test]
    async fn soft_penalty_can_downgrade_to_pass() {
        // 70 + 15 + 10 - 5 (std 4.5) = 90; OVER then x0.7 (variance) x0.85 (short rest) = 53.55
        let features = clean_features(8.0)
            .with(K_STD_LAST_10, 4.5)
            .with(DAYS_REST, 3.0);
        let request = PredictionRequest::new("592450", features, Some(6.5));
        let result = predictor("reg_a").predict(&request).await;

        assert_eq!(result.recommendation, Recommendation::Pass);
        assert_eq!(result.red_flags.len(), 2);
        assert!((result.confidence - 53.55).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_line_is_reported() {
        let request = PredictionRequest::new("592450", clean_features(7.0), None);
        let result = predictor("reg_a").predict(&request).await;
        assert_eq!(result.recommendation, Recommendation::NoLine);
        assert_eq!(result.edge, None);
    }

    #[tokio::test]
    async fn classifier_decision_bypasses_generic_floors() {
        // sigmoid(ln 1.5) = 0.6
        let features = clean_features((1.5f64).ln());
        let request = PredictionRequest::new("592450", features, Some(6.5));
        let result = predictor("clf").predict(&request).await;

        assert_eq!(result.recommendation, Recommendation::Over);
        assert!((result.p_over.unwrap() - 0.6).abs() < 1e-12);
        assert!((result.predicted_value.unwrap() - 6.7).abs() < 1e-9);
        assert!((result.confidence - 20.0).abs() < 1e-9);
    }
}
