//! Edge/confidence gate that turns a prediction into a decision.

use crate::config::ModelCalibration;
use crate::domain::Recommendation;

/// Float slack so an edge of exactly `min_edge` is not lost to rounding
/// (0.3 - 0.1 evaluates to 0.19999999999999998).
pub const EDGE_EPSILON: f64 = 1e-9;

/// Edge and decision for one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub edge: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationEngine {
    min_edge: f64,
    min_confidence: f64,
}

impl RecommendationEngine {
    pub fn new(min_edge: f64, min_confidence: f64) -> Self {
        Self {
            min_edge,
            min_confidence,
        }
    }

    pub fn from_calibration(calibration: &ModelCalibration) -> Self {
        Self::new(calibration.min_edge, calibration.min_confidence)
    }

    pub fn min_edge(&self) -> f64 {
        self.min_edge
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn recommend(&self, predicted_value: f64, line: Option<f64>, confidence: f64) -> Decision {
        let Some(line) = line else {
            return Decision {
                recommendation: Recommendation::NoLine,
                edge: None,
            };
        };

        let edge = predicted_value - line;
        let recommendation = if confidence + EDGE_EPSILON < self.min_confidence
            || edge.abs() + EDGE_EPSILON < self.min_edge
        {
            Recommendation::Pass
        } else if edge > 0.0 {
            Recommendation::Over
        } else if edge < 0.0 {
            Recommendation::Under
        } else {
            // zero edge with a zero floor
            Recommendation::Pass
        };

        Decision {
            recommendation,
            edge: Some(edge),
        }
    }

    /// Second pass after red-flag adjustment.
    ///
    /// Only an actionable preliminary decision is re-gated; PASS and NO_LINE
    /// stay where they are even if soft boosts raised the confidence.
    pub fn finalize(
        &self,
        preliminary: Recommendation,
        predicted_value: f64,
        line: Option<f64>,
        adjusted_confidence: f64,
    ) -> Decision {
        let second = self.recommend(predicted_value, line, adjusted_confidence);
        if preliminary.is_actionable() {
            second
        } else {
            Decision {
                recommendation: preliminary,
                edge: second.edge,
            }
        }
    }
}
