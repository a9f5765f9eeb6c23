use serde::{Deserialize, Serialize};

use crate::features::names::{OPPONENT_K_RATE, SWSTR_PCT};

/// Thresholds and factors for the red-flag rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlagConfig {
    // Hard skips
    /// Average innings over the last five starts below this is opener / bulk usage
    #[serde(default = "default_min_avg_innings")]
    pub min_avg_innings: f64,
    #[serde(default = "default_min_career_starts")]
    pub min_career_starts: f64,

    // Soft adjustments
    #[serde(default = "default_early_season_starts")]
    pub early_season_starts: f64,
    #[serde(default = "default_early_season_factor")]
    pub early_season_factor: f64,

    #[serde(default = "default_high_variance_std")]
    pub high_variance_std: f64,
    #[serde(default = "default_high_variance_over_factor")]
    pub high_variance_over_factor: f64,
    #[serde(default = "default_high_variance_under_factor")]
    pub high_variance_under_factor: f64,

    #[serde(default = "default_short_rest_days")]
    pub short_rest_days: f64,
    #[serde(default = "default_short_rest_factor")]
    pub short_rest_factor: f64,

    #[serde(default = "default_high_pitch_count")]
    pub high_pitch_count: f64,
    #[serde(default = "default_high_pitch_count_factor")]
    pub high_pitch_count_factor: f64,

    /// Auxiliary signal thresholds, evaluated in order
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalThreshold>,

    /// Last-3 average over season average
    #[serde(default = "default_hot_ratio")]
    pub hot_ratio: f64,
    #[serde(default = "default_cold_ratio")]
    pub cold_ratio: f64,
    #[serde(default = "default_trend_boost")]
    pub trend_boost: f64,
    #[serde(default = "default_trend_reduce")]
    pub trend_reduce: f64,

    /// Floor for the cumulative multiplier
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,
}

/// Directional adjustment when a feature is above `high` or below `low`.
///
/// Above `high` favours OVER, below `low` favours UNDER.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThreshold {
    pub feature: String,
    pub high: f64,
    pub low: f64,
    /// Applied to the favoured side
    #[serde(default = "default_signal_boost")]
    pub boost: f64,
    /// Applied to the opposing side
    #[serde(default = "default_signal_reduce")]
    pub reduce: f64,
}

fn default_min_avg_innings() -> f64 {
    4.0
}
fn default_min_career_starts() -> f64 {
    3.0
}
fn default_early_season_starts() -> f64 {
    3.0
}
fn default_early_season_factor() -> f64 {
    0.85
}
fn default_high_variance_std() -> f64 {
    3.5
}
fn default_high_variance_over_factor() -> f64 {
    0.7
}
fn default_high_variance_under_factor() -> f64 {
    1.1
}
fn default_short_rest_days() -> f64 {
    4.0
}
fn default_short_rest_factor() -> f64 {
    0.85
}
fn default_high_pitch_count() -> f64 {
    105.0
}
fn default_high_pitch_count_factor() -> f64 {
    0.9
}
fn default_signal_boost() -> f64 {
    1.1
}
fn default_signal_reduce() -> f64 {
    0.85
}
fn default_hot_ratio() -> f64 {
    1.15
}
fn default_cold_ratio() -> f64 {
    0.85
}
fn default_trend_boost() -> f64 {
    1.1
}
fn default_trend_reduce() -> f64 {
    0.85
}
fn default_min_multiplier() -> f64 {
    0.3
}

fn default_signals() -> Vec<SignalThreshold> {
    vec![
        SignalThreshold {
            feature: SWSTR_PCT.to_string(),
            high: 0.13,
            low: 0.09,
            boost: 1.1,
            reduce: 0.85,
        },
        SignalThreshold {
            feature: OPPONENT_K_RATE.to_string(),
            high: 0.25,
            low: 0.20,
            boost: 1.05,
            reduce: 0.9,
        },
    ]
}

impl Default for RedFlagConfig {
    fn default() -> Self {
        Self {
            min_avg_innings: default_min_avg_innings(),
            min_career_starts: default_min_career_starts(),
            early_season_starts: default_early_season_starts(),
            early_season_factor: default_early_season_factor(),
            high_variance_std: default_high_variance_std(),
            high_variance_over_factor: default_high_variance_over_factor(),
            high_variance_under_factor: default_high_variance_under_factor(),
            short_rest_days: default_short_rest_days(),
            short_rest_factor: default_short_rest_factor(),
            high_pitch_count: default_high_pitch_count(),
            high_pitch_count_factor: default_high_pitch_count_factor(),
            signals: default_signals(),
            hot_ratio: default_hot_ratio(),
            cold_ratio: default_cold_ratio(),
            trend_boost: default_trend_boost(),
            trend_reduce: default_trend_reduce(),
            min_multiplier: default_min_multiplier(),
        }
    }
}

impl RedFlagConfig {
    /// Problems with the configured values; empty when valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let factors = [
            ("early_season_factor", self.early_season_factor),
            ("high_variance_over_factor", self.high_variance_over_factor),
            ("high_variance_under_factor", self.high_variance_under_factor),
            ("short_rest_factor", self.short_rest_factor),
            ("high_pitch_count_factor", self.high_pitch_count_factor),
            ("trend_boost", self.trend_boost),
            ("trend_reduce", self.trend_reduce),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("red_flags.{name} must be > 0"));
            }
        }

        if !(0.0..=1.0).contains(&self.min_multiplier) {
            errors.push("red_flags.min_multiplier must be in [0, 1]".to_string());
        }
        if self.cold_ratio >= self.hot_ratio {
            errors.push("red_flags.cold_ratio must be below hot_ratio".to_string());
        }

        for (i, signal) in self.signals.iter().enumerate() {
            if signal.feature.trim().is_empty() {
                errors.push(format!("red_flags.signals[{i}].feature is empty"));
            }
            if signal.low > signal.high {
                errors.push(format!(
                    "red_flags.signals[{i}] ({}): low must not exceed high",
                    signal.feature
                ));
            }
            if signal.boost <= 0.0 || signal.reduce <= 0.0 {
                errors.push(format!(
                    "red_flags.signals[{i}] ({}): factors must be > 0",
                    signal.feature
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RedFlagConfig::default().validate().is_empty());
    }

    #[test]
    fn bad_values_are_reported() {
        let config = RedFlagConfig {
            min_multiplier: 1.5,
            short_rest_factor: 0.0,
            cold_ratio: 1.2,
            ..RedFlagConfig::default()
        };
        assert_eq!(config.validate().len(), 3);
    }
}
