//! Confidence scoring and the edge/confidence recommendation gate.

pub mod confidence;
pub mod recommendation;

pub use confidence::{ConfidenceConfig, ConfidenceScorer, QualitySignals, Step};
pub use recommendation::{Decision, RecommendationEngine};
