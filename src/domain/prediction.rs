//! Serializable prediction records.
//!
//! ERROR and SKIP results use the same shape as scored results, with the
//! numeric fields nulled (or zeroed for confidence), so downstream
//! aggregation never has to special-case a failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::FeatureSet;
use super::recommendation::Recommendation;

/// Input for one subject on one slate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub subject_id: String,
    /// Display name, used for roster matching when present
    #[serde(default)]
    pub subject_name: Option<String>,
    pub features: FeatureSet,
    #[serde(default)]
    pub line: Option<f64>,
}

impl PredictionRequest {
    pub fn new(subject_id: &str, features: FeatureSet, line: Option<f64>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            subject_name: None,
            features,
            line,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.subject_name = Some(name.to_string());
        self
    }

    /// Key used for roster lookups
    pub fn roster_key(&self) -> &str {
        self.subject_name.as_deref().unwrap_or(&self.subject_id)
    }
}

/// One model's verdict for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub subject_id: String,
    pub model_version: String,
    /// Point estimate. Kept on SKIP for audit, null on ERROR.
    pub predicted_value: Option<f64>,
    pub line: Option<f64>,
    /// predicted_value - line
    pub edge: Option<f64>,
    /// 0-100
    pub confidence: f64,
    pub recommendation: Recommendation,
    /// Classifier probability that the outcome lands over the line
    #[serde(default)]
    pub p_over: Option<f64>,
    /// Product of soft red-flag factors applied to confidence
    pub confidence_multiplier: f64,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl PredictionResult {
    pub fn error(
        subject_id: &str,
        model_version: &str,
        line: Option<f64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            model_version: model_version.to_string(),
            predicted_value: None,
            line,
            edge: None,
            confidence: 0.0,
            recommendation: Recommendation::Error,
            p_over: None,
            confidence_multiplier: 1.0,
            red_flags: Vec::new(),
            skip_reason: None,
            error: Some(message.into()),
            generated_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.recommendation == Recommendation::Error
    }

    pub fn is_skip(&self) -> bool {
        self.recommendation == Recommendation::Skip
    }
}

/// How closely ensemble components agreed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementClass {
    /// Spread below the strong-agreement threshold
    Strong,
    Moderate,
    /// Spread at or above the weak-agreement threshold
    Weak,
    /// Only one component produced a score
    SingleModel,
    /// No combination took place (all skipped or errored)
    NotApplicable,
}

impl std::fmt::Display for AgreementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgreementClass::Strong => "strong",
            AgreementClass::Moderate => "moderate",
            AgreementClass::Weak => "weak",
            AgreementClass::SingleModel => "single_model",
            AgreementClass::NotApplicable => "n/a",
        };
        write!(f, "{}", s)
    }
}

/// Outcome category of one ensemble component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Scored,
    Skipped,
    Errored,
}

/// Audit record for one ensemble component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub model_version: String,
    /// Weight after renormalization
    pub weight: f64,
    pub status: ComponentStatus,
    pub predicted_value: Option<f64>,
    pub confidence: f64,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Combination of two or more component predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub subject_id: String,
    pub predicted_value: Option<f64>,
    pub line: Option<f64>,
    pub edge: Option<f64>,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub agreement: AgreementClass,
    /// Max pairwise spread between scored components
    #[serde(default)]
    pub prediction_delta: Option<f64>,
    pub confidence_multiplier: f64,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub components: Vec<ComponentSummary>,
    pub generated_at: DateTime<Utc>,
}

impl EnsembleResult {
    /// Failed combination; no component ran or none produced anything usable
    pub fn error(subject_id: &str, line: Option<f64>, message: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            predicted_value: None,
            line,
            edge: None,
            confidence: 0.0,
            recommendation: Recommendation::Error,
            agreement: AgreementClass::NotApplicable,
            prediction_delta: None,
            confidence_multiplier: 1.0,
            red_flags: Vec::new(),
            skip_reason: None,
            error: Some(message.into()),
            notes: Vec::new(),
            components: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.recommendation == Recommendation::Error
    }
}
