//! Multi-model combination with failure isolation.
//!
//! Components run independently; an ERROR or SKIP from one never aborts the
//! others. How the surviving results fold together is decided by
//! [`combine`], a pure function over [`ComponentOutcome`]s.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::single::SinglePredictor;
use super::PredictionContext;
use crate::domain::{
    AgreementClass, ComponentStatus, ComponentSummary, EnsembleResult, PredictionRequest,
    PredictionResult, Recommendation,
};
use crate::error::{KpropError, Result};
use crate::scoring::RecommendationEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleComponent {
    pub model_id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default = "default_components")]
    pub components: Vec<EnsembleComponent>,
    /// Confidence multiplier when only one component scored
    #[serde(default = "default_fallback_penalty")]
    pub fallback_penalty: f64,
    #[serde(default = "default_agreement_boost")]
    pub agreement_boost: f64,
    #[serde(default = "default_disagreement_penalty")]
    pub disagreement_penalty: f64,
    /// Spread (strikeouts) below which components strongly agree
    #[serde(default = "default_strong_agreement_delta")]
    pub strong_agreement_delta: f64,
    /// Spread at or above which components disagree
    #[serde(default = "default_weak_agreement_delta")]
    pub weak_agreement_delta: f64,
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_components() -> Vec<EnsembleComponent> {
    vec![
        EnsembleComponent {
            model_id: "k_regressor_v1".to_string(),
            weight: 0.3,
        },
        EnsembleComponent {
            model_id: "k_regressor_v2".to_string(),
            weight: 0.5,
        },
        EnsembleComponent {
            model_id: "k_classifier_v3".to_string(),
            weight: 0.2,
        },
    ]
}

fn default_fallback_penalty() -> f64 {
    0.8
}
fn default_agreement_boost() -> f64 {
    1.1
}
fn default_disagreement_penalty() -> f64 {
    0.85
}
fn default_strong_agreement_delta() -> f64 {
    1.0
}
fn default_weak_agreement_delta() -> f64 {
    2.0
}
fn default_min_edge() -> f64 {
    0.5
}
fn default_min_confidence() -> f64 {
    60.0
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            components: default_components(),
            fallback_penalty: default_fallback_penalty(),
            agreement_boost: default_agreement_boost(),
            disagreement_penalty: default_disagreement_penalty(),
            strong_agreement_delta: default_strong_agreement_delta(),
            weak_agreement_delta: default_weak_agreement_delta(),
            min_edge: default_min_edge(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.components.len() < 2 {
            errors.push("ensemble.components needs at least two models".to_string());
        }
        let mut seen = HashSet::new();
        for c in &self.components {
            if !seen.insert(c.model_id.as_str()) {
                errors.push(format!("ensemble component {} listed twice", c.model_id));
            }
            if !c.weight.is_finite() || c.weight < 0.0 {
                errors.push(format!("ensemble component {} weight must be >= 0", c.model_id));
            }
        }
        for (name, value) in [
            ("fallback_penalty", self.fallback_penalty),
            ("agreement_boost", self.agreement_boost),
            ("disagreement_penalty", self.disagreement_penalty),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("ensemble.{name} must be > 0"));
            }
        }
        if self.strong_agreement_delta > self.weak_agreement_delta {
            errors.push(
                "ensemble.strong_agreement_delta must not exceed weak_agreement_delta".to_string(),
            );
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            errors.push("ensemble.min_confidence must be in [0, 100]".to_string());
        }
        errors
    }
}

/// Scale weights to sum to 1.0; equal weights when they cannot be scaled
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let cleaned: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        let n = weights.len().max(1) as f64;
        return vec![1.0 / n; weights.len()];
    }
    cleaned.iter().map(|w| w / total).collect()
}

/// One component's result, classified
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentOutcome {
    Scored(PredictionResult),
    Skipped(PredictionResult),
    Errored(PredictionResult),
}

impl From<PredictionResult> for ComponentOutcome {
    fn from(result: PredictionResult) -> Self {
        match result.recommendation {
            Recommendation::Error => ComponentOutcome::Errored(result),
            Recommendation::Skip => ComponentOutcome::Skipped(result),
            _ if result.predicted_value.is_none() => ComponentOutcome::Errored(result),
            _ => ComponentOutcome::Scored(result),
        }
    }
}

impl ComponentOutcome {
    pub fn result(&self) -> &PredictionResult {
        match self {
            ComponentOutcome::Scored(r) | ComponentOutcome::Skipped(r) | ComponentOutcome::Errored(r) => r,
        }
    }

    pub fn status(&self) -> ComponentStatus {
        match self {
            ComponentOutcome::Scored(_) => ComponentStatus::Scored,
            ComponentOutcome::Skipped(_) => ComponentStatus::Skipped,
            ComponentOutcome::Errored(_) => ComponentStatus::Errored,
        }
    }

    fn scored_value(&self) -> Option<(f64, f64)> {
        match self {
            ComponentOutcome::Scored(r) => r.predicted_value.map(|v| (v, r.confidence)),
            _ => None,
        }
    }
}

/// How a set of component outcomes folds together
#[derive(Debug, Clone, PartialEq)]
pub enum Combination {
    AllErrored { errors: Vec<String> },
    AllSkipped { flags: Vec<String> },
    /// Exactly one component scored; `index` points at it
    Fallback { index: usize, confidence: f64 },
    Blended {
        value: f64,
        base_confidence: f64,
        confidence: f64,
        delta: f64,
        agreement: AgreementClass,
        /// Per component, renormalized over the scored ones (0 for the rest)
        weights: Vec<f64>,
    },
}

pub fn combine(
    outcomes: &[ComponentOutcome],
    weights: &[f64],
    config: &EnsembleConfig,
) -> Combination {
    let scored: Vec<(usize, f64, f64)> = outcomes
        .iter()
        .enumerate()
        .filter_map(|(i, o)| o.scored_value().map(|(v, c)| (i, v, c)))
        .collect();

    match scored.as_slice() {
        [] => {
            let skipped: Vec<&PredictionResult> = outcomes
                .iter()
                .filter_map(|o| match o {
                    ComponentOutcome::Skipped(r) => Some(r),
                    _ => None,
                })
                .collect();
            if skipped.is_empty() {
                Combination::AllErrored {
                    errors: outcomes
                        .iter()
                        .map(|o| {
                            let r = o.result();
                            format!(
                                "{}: {}",
                                r.model_version,
                                r.error.as_deref().unwrap_or("no score")
                            )
                        })
                        .collect(),
                }
            } else {
                let mut seen = HashSet::new();
                let flags = skipped
                    .iter()
                    .flat_map(|r| r.red_flags.iter())
                    .filter(|f| seen.insert(f.as_str()))
                    .cloned()
                    .collect();
                Combination::AllSkipped { flags }
            }
        }
        [(index, _, confidence)] => Combination::Fallback {
            index: *index,
            confidence: (confidence * config.fallback_penalty).clamp(0.0, 100.0),
        },
        many => {
            let raw: Vec<f64> = many
                .iter()
                .map(|(i, _, _)| weights.get(*i).copied().unwrap_or(0.0))
                .collect();
            let normalized = normalize_weights(&raw);

            let value: f64 = many
                .iter()
                .zip(&normalized)
                .map(|((_, v, _), w)| v * w)
                .sum();
            let base_confidence =
                many.iter().map(|(_, _, c)| c).sum::<f64>() / many.len() as f64;

            let (lo, hi) = many
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v, _)| {
                    (lo.min(*v), hi.max(*v))
                });
            let delta = hi - lo;

            let (agreement, factor) = if delta < config.strong_agreement_delta {
                (AgreementClass::Strong, config.agreement_boost)
            } else if delta < config.weak_agreement_delta {
                (AgreementClass::Moderate, 1.0)
            } else {
                (AgreementClass::Weak, config.disagreement_penalty)
            };

            let mut per_component = vec![0.0; outcomes.len()];
            for ((i, _, _), w) in many.iter().zip(&normalized) {
                per_component[*i] = *w;
            }

            Combination::Blended {
                value,
                base_confidence,
                confidence: (base_confidence * factor).clamp(0.0, 100.0),
                delta,
                agreement,
                weights: per_component,
            }
        }
    }
}

pub struct EnsembleCombiner {
    components: Vec<(SinglePredictor, f64)>,
    config: EnsembleConfig,
    engine: RecommendationEngine,
    context: Arc<PredictionContext>,
}

impl EnsembleCombiner {
    pub fn new(
        components: Vec<(SinglePredictor, f64)>,
        config: EnsembleConfig,
        context: Arc<PredictionContext>,
    ) -> Result<Self> {
        if components.len() < 2 {
            return Err(KpropError::Validation(format!(
                "an ensemble needs at least two components, got {}",
                components.len()
            )));
        }
        Ok(Self {
            engine: RecommendationEngine::new(config.min_edge, config.min_confidence),
            components,
            config,
            context,
        })
    }

    pub fn component_ids(&self) -> Vec<&str> {
        self.components.iter().map(|(p, _)| p.model_id()).collect()
    }

    pub async fn predict(&self, request: &PredictionRequest) -> EnsembleResult {
        let results = futures::future::join_all(
            self.components.iter().map(|(predictor, _)| predictor.predict(request)),
        )
        .await;
        let outcomes: Vec<ComponentOutcome> = results.into_iter().map(Into::into).collect();
        let weights: Vec<f64> = self.components.iter().map(|(_, w)| *w).collect();

        let combination = combine(&outcomes, &weights, &self.config);
        debug!(subject = %request.subject_id, ?combination, "ensemble combination");

        self.finish(request, &outcomes, combination).await
    }

    async fn finish(
        &self,
        request: &PredictionRequest,
        outcomes: &[ComponentOutcome],
        combination: Combination,
    ) -> EnsembleResult {
        let mut result = EnsembleResult {
            subject_id: request.subject_id.clone(),
            predicted_value: None,
            line: request.line,
            edge: None,
            confidence: 0.0,
            recommendation: Recommendation::Error,
            agreement: AgreementClass::NotApplicable,
            prediction_delta: None,
            confidence_multiplier: 1.0,
            red_flags: Vec::new(),
            skip_reason: None,
            error: None,
            notes: Vec::new(),
            components: summaries(outcomes, &vec![0.0; outcomes.len()]),
            generated_at: Utc::now(),
        };

        match combination {
            Combination::AllErrored { errors } => {
                result.error = Some(format!("all components failed: {}", errors.join("; ")));
            }
            Combination::AllSkipped { flags } => {
                result.recommendation = Recommendation::Skip;
                result.skip_reason = Some("all components skipped".to_string());
                result.red_flags = flags;
            }
            Combination::Fallback { index, confidence } => {
                let used = outcomes[index].result();
                let mut weights = vec![0.0; outcomes.len()];
                weights[index] = 1.0;

                info!(
                    subject = %request.subject_id,
                    model = %used.model_version,
                    "ensemble fell back to a single component"
                );
                result.predicted_value = used.predicted_value;
                result.edge = used.edge;
                result.confidence = confidence;
                result.recommendation = used.recommendation;
                result.agreement = AgreementClass::SingleModel;
                result.confidence_multiplier = self.config.fallback_penalty;
                result.red_flags = used.red_flags.clone();
                result.notes.push(format!(
                    "fallback: only {} produced a score",
                    used.model_version
                ));
                result.components = summaries(outcomes, &weights);
            }
            Combination::Blended {
                value,
                base_confidence,
                confidence,
                delta,
                agreement,
                weights,
            } => {
                result.predicted_value = Some(value);
                result.agreement = agreement;
                result.prediction_delta = Some(delta);
                result.components = summaries(outcomes, &weights);
                result.notes.push(format!(
                    "{agreement} agreement: spread {delta:.2}, mean confidence {base_confidence:.1}"
                ));

                let preliminary = self.engine.recommend(value, request.line, confidence);
                result.edge = preliminary.edge;

                let resolved = self.context.normalizer.resolve(&request.features);
                let unavailable = self.context.roster.is_unavailable(request.roster_key()).await;
                let flags = self
                    .context
                    .policy
                    .evaluate(&resolved, preliminary.recommendation, unavailable);

                result.confidence_multiplier = flags.multiplier;
                result.red_flags = flags.flags;
                if flags.skip {
                    result.recommendation = Recommendation::Skip;
                    result.skip_reason = flags.skip_reason;
                } else {
                    let adjusted = (confidence * flags.multiplier).clamp(0.0, 100.0);
                    result.confidence = adjusted;
                    result.recommendation = self
                        .engine
                        .finalize(preliminary.recommendation, value, request.line, adjusted)
                        .recommendation;
                }
            }
        }

        result
    }
}

fn summaries(outcomes: &[ComponentOutcome], weights: &[f64]) -> Vec<ComponentSummary> {
    outcomes
        .iter()
        .zip(weights)
        .map(|(outcome, weight)| {
            let r = outcome.result();
            ComponentSummary {
                model_version: r.model_version.clone(),
                weight: *weight,
                status: outcome.status(),
                predicted_value: r.predicted_value,
                confidence: r.confidence,
                recommendation: r.recommendation,
                red_flags: r.red_flags.clone(),
                error: r.error.clone(),
            }
        })
        .collect()
}
