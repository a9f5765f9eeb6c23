pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod ml;
pub mod model;
pub mod predictor;
pub mod red_flags;
pub mod roster;
pub mod scoring;
pub mod service;

pub use config::{AppConfig, ModelCalibration};
pub use domain::{
    AgreementClass, EnsembleResult, FeatureSet, FeatureValue, PredictionRequest,
    PredictionResult, Recommendation,
};
pub use error::{KpropError, Result};
pub use features::{FeatureNormalizer, FeatureProvider, FeatureSchema};
pub use model::{ModelArtifactStore, ModelBackend, ModelCache, ModelKind, ModelVersion};
pub use predictor::{EnsembleCombiner, EnsembleConfig, SinglePredictor};
pub use red_flags::{RedFlagOutcome, RedFlagPolicy, Rule};
pub use roster::{RosterStatusCache, RosterStatusProvider};
pub use scoring::{ConfidenceScorer, RecommendationEngine};
pub use service::{PredictionService, SlateEntry};
