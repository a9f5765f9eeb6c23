//! Data-quality confidence scoring.
//!
//! Confidence starts from a per-version base and moves by additive,
//! order-independent deltas for three signals:
//! - feature completeness (0-100)
//! - rolling sample count (recent starts in the feature window)
//! - standard deviation of recent strikeout totals
//!
//! The result is always clamped to [0, 100].

use serde::{Deserialize, Serialize};

/// A threshold step: `delta` applies when the signal is at or above `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub min: f64,
    pub delta: f64,
}

impl Step {
    pub const fn new(min: f64, delta: f64) -> Self {
        Self { min, delta }
    }
}

/// Confidence scorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Completeness steps, checked highest first
    #[serde(default = "default_completeness_steps")]
    pub completeness_steps: Vec<Step>,
    /// Delta when completeness is below every step
    #[serde(default = "default_low_completeness_delta")]
    pub low_completeness_delta: f64,

    /// Sample-count steps, checked highest first
    #[serde(default = "default_sample_steps")]
    pub sample_steps: Vec<Step>,
    #[serde(default = "default_low_sample_delta")]
    pub low_sample_delta: f64,

    /// Std-dev below this earns `tight_std_delta`
    #[serde(default = "default_tight_std")]
    pub tight_std: f64,
    #[serde(default = "default_tight_std_delta")]
    pub tight_std_delta: f64,
    /// Std-dev below this (but not tight) earns `moderate_std_delta`
    #[serde(default = "default_moderate_std")]
    pub moderate_std: f64,
    #[serde(default = "default_moderate_std_delta")]
    pub moderate_std_delta: f64,
    /// Std-dev above this costs `wide_std_delta`
    #[serde(default = "default_wide_std")]
    pub wide_std: f64,
    #[serde(default = "default_wide_std_delta")]
    pub wide_std_delta: f64,
}

fn default_completeness_steps() -> Vec<Step> {
    vec![
        Step::new(90.0, 15.0),
        Step::new(80.0, 10.0),
        Step::new(70.0, 5.0),
        Step::new(50.0, 0.0),
    ]
}

fn default_low_completeness_delta() -> f64 {
    -10.0
}

fn default_sample_steps() -> Vec<Step> {
    vec![Step::new(10.0, 10.0), Step::new(5.0, 5.0), Step::new(3.0, 0.0)]
}

fn default_low_sample_delta() -> f64 {
    -10.0
}

fn default_tight_std() -> f64 {
    2.0
}

fn default_tight_std_delta() -> f64 {
    5.0
}

fn default_moderate_std() -> f64 {
    3.0
}

fn default_moderate_std_delta() -> f64 {
    2.0
}

fn default_wide_std() -> f64 {
    4.0
}

fn default_wide_std_delta() -> f64 {
    -5.0
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            completeness_steps: default_completeness_steps(),
            low_completeness_delta: default_low_completeness_delta(),
            sample_steps: default_sample_steps(),
            low_sample_delta: default_low_sample_delta(),
            tight_std: default_tight_std(),
            tight_std_delta: default_tight_std_delta(),
            moderate_std: default_moderate_std(),
            moderate_std_delta: default_moderate_std_delta(),
            wide_std: default_wide_std(),
            wide_std_delta: default_wide_std_delta(),
        }
    }
}

/// Inputs to the confidence scorer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualitySignals {
    /// 0-100
    pub completeness: f64,
    pub sample_count: Option<f64>,
    pub outcome_std: Option<f64>,
}

/// Converts data-quality signals into a 0-100 confidence score
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, base: f64, signals: &QualitySignals) -> f64 {
        let total = base
            + self.completeness_delta(signals.completeness)
            + self.sample_delta(signals.sample_count.unwrap_or(0.0))
            + signals.outcome_std.map_or(0.0, |s| self.std_delta(s));

        if total.is_nan() {
            return 0.0;
        }
        total.clamp(0.0, 100.0)
    }

    fn completeness_delta(&self, completeness: f64) -> f64 {
        step_delta(
            &self.config.completeness_steps,
            completeness,
            self.config.low_completeness_delta,
        )
    }

    fn sample_delta(&self, samples: f64) -> f64 {
        step_delta(&self.config.sample_steps, samples, self.config.low_sample_delta)
    }

    fn std_delta(&self, std: f64) -> f64 {
        let c = &self.config;
        if !std.is_finite() {
            0.0
        } else if std < c.tight_std {
            c.tight_std_delta
        } else if std < c.moderate_std {
            c.moderate_std_delta
        } else if std > c.wide_std {
            c.wide_std_delta
        } else {
            0.0
        }
    }
}

/// First matching step by descending `min`; `fallback` when none match.
fn step_delta(steps: &[Step], value: f64, fallback: f64) -> f64 {
    let mut ordered: Vec<&Step> = steps.iter().collect();
    ordered.sort_by(|a, b| b.min.total_cmp(&a.min));
    ordered
        .into_iter()
        .find(|s| value >= s.min)
        .map_or(fallback, |s| s.delta)
}
