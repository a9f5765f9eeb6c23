//! Uniform scoring over regressor and classifier artifacts.

use std::sync::Arc;

use super::artifact::ModelArtifact;
use super::version::{ModelKind, ModelVersion};
use crate::config::ModelCalibration;
use crate::domain::Recommendation;
use crate::error::{KpropError, Result};
use crate::features::names::K_AVG_SEASON;
use crate::features::{FeatureSchema, ResolvedFeatures};
use crate::scoring::recommendation::EDGE_EPSILON;

/// What a backend produced for one vector
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredOutput {
    /// Point estimate of the strikeout count
    pub value: f64,
    /// Classifier only: P(actual > line)
    pub p_over: Option<f64>,
    /// Classifier only: confidence derived from the probability
    pub confidence: Option<f64>,
    /// Classifier only: decision that bypasses the generic thresholds
    pub decision: Option<Recommendation>,
}

impl ScoredOutput {
    fn point(value: f64) -> Self {
        Self {
            value,
            p_over: None,
            confidence: None,
            decision: None,
        }
    }
}

pub trait ModelBackend: Send + Sync {
    fn version(&self) -> &ModelVersion;

    fn schema(&self) -> &FeatureSchema;

    fn score(
        &self,
        vector: &[f64],
        line: Option<f64>,
        features: &ResolvedFeatures,
    ) -> Result<ScoredOutput>;
}

/// Pick the backend matching the artifact's kind
pub fn backend_for(
    artifact: Arc<ModelArtifact>,
    calibration: &ModelCalibration,
) -> Box<dyn ModelBackend> {
    match artifact.version.kind {
        ModelKind::Regressor => Box::new(RegressorBackend::new(artifact, calibration)),
        ModelKind::Classifier => Box::new(ClassifierBackend::new(artifact, calibration)),
    }
}

/// Raw output is the expected count, clamped to a plausible range
pub struct RegressorBackend {
    artifact: Arc<ModelArtifact>,
    floor: f64,
    ceiling: f64,
}

impl RegressorBackend {
    pub fn new(artifact: Arc<ModelArtifact>, calibration: &ModelCalibration) -> Self {
        Self {
            artifact,
            floor: calibration.value_floor,
            ceiling: calibration.value_ceiling,
        }
    }
}

impl ModelBackend for RegressorBackend {
    fn version(&self) -> &ModelVersion {
        &self.artifact.version
    }

    fn schema(&self) -> &FeatureSchema {
        &self.artifact.schema
    }

    fn score(&self, vector: &[f64], _line: Option<f64>, _features: &ResolvedFeatures) -> Result<ScoredOutput> {
        let raw = self.artifact.estimator.evaluate(vector)?;
        Ok(ScoredOutput::point(raw.clamp(self.floor, self.ceiling)))
    }
}

/// Raw output is P(actual > line).
///
/// `edge = (p - 0.5) * 2` strikeouts, anchored on the line (or on the
/// season average when no line is posted).
pub struct ClassifierBackend {
    artifact: Arc<ModelArtifact>,
    over_probability: f64,
    under_probability: f64,
    baseline: f64,
}

impl ClassifierBackend {
    pub fn new(artifact: Arc<ModelArtifact>, calibration: &ModelCalibration) -> Self {
        Self {
            artifact,
            over_probability: calibration.over_probability,
            under_probability: calibration.under_probability,
            baseline: calibration.baseline,
        }
    }

    fn decide(&self, p: f64, line: Option<f64>) -> Recommendation {
        if line.is_none() {
            Recommendation::NoLine
        } else if p >= self.over_probability - EDGE_EPSILON {
            Recommendation::Over
        } else if p <= self.under_probability + EDGE_EPSILON {
            Recommendation::Under
        } else {
            Recommendation::Pass
        }
    }
}

impl ModelBackend for ClassifierBackend {
    fn version(&self) -> &ModelVersion {
        &self.artifact.version
    }

    fn schema(&self) -> &FeatureSchema {
        &self.artifact.schema
    }

    fn score(&self, vector: &[f64], line: Option<f64>, features: &ResolvedFeatures) -> Result<ScoredOutput> {
        let p = self.artifact.estimator.evaluate(vector)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(KpropError::Scoring(format!(
                "classifier {} returned probability {p} outside [0, 1]",
                self.artifact.version.id
            )));
        }

        let edge_estimate = (p - 0.5) * 2.0;
        let anchor = line
            .or_else(|| features.get(K_AVG_SEASON))
            .unwrap_or(self.baseline);

        Ok(ScoredOutput {
            value: anchor + edge_estimate,
            p_over: Some(p),
            confidence: Some(((p - 0.5).abs() * 200.0).min(100.0)),
            decision: Some(self.decide(p, line)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeatureSet;
    use crate::features::FeatureNormalizer;
    use crate::model::artifact::{fixtures, ArtifactDocument};

    fn artifact(doc: serde_json::Value, id: &str) -> Arc<ModelArtifact> {
        let raw = serde_json::to_vec(&doc).unwrap();
        let parsed = ArtifactDocument::from_slice(&raw).unwrap();
        Arc::new(ModelArtifact::assemble(id, parsed, "memory://".into(), &raw, None).unwrap())
    }

    /// Weight/bias such that sigmoid(0) = 0.5 and sigmoid(ln 1.5) = 0.6
    fn classifier(calibration: &ModelCalibration) -> Box<dyn ModelBackend> {
        backend_for(
            artifact(fixtures::classifier_doc("k_classifier_v3", 1.0, 0.0), "k_classifier_v3"),
            calibration,
        )
    }

    #[test]
    fn regressor_clamps_to_plausible_range() {
        let calibration = ModelCalibration::default();
        let backend = backend_for(
            artifact(fixtures::regressor_doc("k_regressor_v2"), "k_regressor_v2"),
            &calibration,
        );
        let resolved = ResolvedFeatures::default();
        assert_eq!(backend.score(&[7.0, 0.2], Some(6.5), &resolved).unwrap().value, 7.0);
        assert_eq!(backend.score(&[35.0, 0.2], Some(6.5), &resolved).unwrap().value, 20.0);
        assert_eq!(backend.score(&[-2.0, 0.2], None, &resolved).unwrap().value, 0.0);
    }

    #[test]
    fn classifier_probability_maps_to_value_and_confidence() {
        let calibration = ModelCalibration::default();
        let backend = classifier(&calibration);
        let x = (0.6f64 / 0.4).ln();
        let out = backend
            .score(&[x], Some(6.5), &ResolvedFeatures::default())
            .unwrap();

        assert!((out.p_over.unwrap() - 0.6).abs() < 1e-12);
        assert!((out.value - 6.7).abs() < 1e-9);
        assert!((out.confidence.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(out.decision, Some(Recommendation::Over));
    }

    #[test]
    fn classifier_embedded_thresholds() {
        let calibration = ModelCalibration::default();
        let backend = classifier(&calibration);
        let resolved = ResolvedFeatures::default();
        let logit = |p: f64| (p / (1.0 - p)).ln();

        let under = backend.score(&[logit(0.45)], Some(6.5), &resolved).unwrap();
        assert_eq!(under.decision, Some(Recommendation::Under));

        let pass = backend.score(&[logit(0.51)], Some(6.5), &resolved).unwrap();
        assert_eq!(pass.decision, Some(Recommendation::Pass));
    }

    #[test]
    fn classifier_without_line_anchors_on_season_average() {
        let calibration = ModelCalibration::default();
        let backend = classifier(&calibration);
        let resolved = FeatureNormalizer::default()
            .resolve(&FeatureSet::new().with(K_AVG_SEASON, 6.0));

        let out = backend.score(&[0.0], None, &resolved).unwrap();
        assert_eq!(out.decision, Some(Recommendation::NoLine));
        assert!((out.value - 6.0).abs() < 1e-12);

        let out = backend.score(&[0.0], None, &ResolvedFeatures::default()).unwrap();
        assert!((out.value - calibration.baseline).abs() < 1e-12);
    }
}
