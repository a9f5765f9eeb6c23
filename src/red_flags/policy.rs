use tracing::debug;

use super::config::RedFlagConfig;
use super::rules::{run_rules, Factor, RedFlagOutcome, Rule, RuleContext};
use crate::domain::Recommendation;
use crate::features::names::*;
use crate::features::ResolvedFeatures;

/// Ordered red-flag rules for strikeout props
#[derive(Debug)]
pub struct RedFlagPolicy {
    rules: Vec<Rule>,
    min_multiplier: f64,
}

impl Default for RedFlagPolicy {
    fn default() -> Self {
        Self::from_config(&RedFlagConfig::default())
    }
}

impl RedFlagPolicy {
    pub fn new(rules: Vec<Rule>, min_multiplier: f64) -> Self {
        Self {
            rules,
            min_multiplier,
        }
    }

    pub fn from_config(config: &RedFlagConfig) -> Self {
        Self::new(standard_rules(config), config.min_multiplier)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn evaluate(
        &self,
        features: &ResolvedFeatures,
        recommendation: Recommendation,
        roster_unavailable: bool,
    ) -> RedFlagOutcome {
        let ctx = RuleContext {
            features,
            recommendation,
            roster_unavailable,
        };
        let outcome = run_rules(&self.rules, &ctx, self.min_multiplier);
        debug!(
            %recommendation,
            skip = outcome.skip,
            multiplier = outcome.multiplier,
            flags = outcome.flags.len(),
            "red flags evaluated"
        );
        outcome
    }
}

fn below(features: &ResolvedFeatures, name: &str, threshold: f64) -> Option<f64> {
    features.get(name).filter(|v| *v < threshold)
}

fn above(features: &ResolvedFeatures, name: &str, threshold: f64) -> Option<f64> {
    features.get(name).filter(|v| *v > threshold)
}

/// The production rule list, in evaluation order
pub fn standard_rules(config: &RedFlagConfig) -> Vec<Rule> {
    let c = config.clone();
    let mut rules = vec![
        Rule::hard_skip("roster_unavailable", |ctx| {
            ctx.roster_unavailable
                .then(|| "listed unavailable on the roster feed".to_string())
        }),
        Rule::hard_skip("no_starts_this_season", |ctx| {
            ctx.features
                .get(GAMES_STARTED_SEASON)
                .filter(|gs| *gs <= 0.0)
                .map(|_| "no starts this season".to_string())
        }),
        Rule::hard_skip("opener_usage", {
            let floor = c.min_avg_innings;
            move |ctx| {
                below(ctx.features, AVG_INNINGS_LAST_5, floor)
                    .map(|ip| format!("opener/bulk usage: {ip:.1} IP per start over last 5"))
            }
        }),
        Rule::hard_skip("thin_history", {
            let min = c.min_career_starts;
            move |ctx| {
                below(ctx.features, CAREER_STARTS, min)
                    .map(|n| format!("insufficient history: {n:.0} career starts"))
            }
        }),
        Rule::soft_adjust("early_season", Factor::Uniform(c.early_season_factor), {
            let starts = c.early_season_starts;
            move |ctx| {
                below(ctx.features, GAMES_STARTED_SEASON, starts)
                    .map(|gs| format!("early season: {gs:.0} starts"))
            }
        }),
        Rule::soft_adjust(
            "high_variance",
            Factor::Directional {
                over: c.high_variance_over_factor,
                under: c.high_variance_under_factor,
            },
            {
                let max_std = c.high_variance_std;
                move |ctx| {
                    above(ctx.features, K_STD_LAST_10, max_std)
                        .map(|std| format!("high variance: K std {std:.2} over last 10"))
                }
            },
        ),
        Rule::soft_adjust(
            "short_rest",
            Factor::Directional {
                over: c.short_rest_factor,
                under: 1.0,
            },
            {
                let min_days = c.short_rest_days;
                move |ctx| {
                    below(ctx.features, DAYS_REST, min_days)
                        .map(|d| format!("short rest: {d:.0} days"))
                }
            },
        ),
        Rule::soft_adjust(
            "high_workload",
            Factor::Directional {
                over: c.high_pitch_count_factor,
                under: 1.0,
            },
            {
                let max_pitches = c.high_pitch_count;
                move |ctx| {
                    above(ctx.features, PITCH_COUNT_LAST_START, max_pitches)
                        .map(|n| format!("high workload: {n:.0} pitches last start"))
                }
            },
        ),
    ];

    for signal in &c.signals {
        let favours_over = Factor::Directional {
            over: signal.boost,
            under: signal.reduce,
        };
        let favours_under = Factor::Directional {
            over: signal.reduce,
            under: signal.boost,
        };

        let (feature, high) = (signal.feature.clone(), signal.high);
        rules.push(Rule::soft_adjust("signal_high", favours_over, move |ctx| {
            ctx.features
                .get(&feature)
                .filter(|v| *v >= high)
                .map(|v| format!("{feature} high: {v:.3}"))
        }));

        let (feature, low) = (signal.feature.clone(), signal.low);
        rules.push(Rule::soft_adjust("signal_low", favours_under, move |ctx| {
            ctx.features
                .get(&feature)
                .filter(|v| *v <= low)
                .map(|v| format!("{feature} low: {v:.3}"))
        }));
    }

    let trend = |ctx: &RuleContext<'_>| -> Option<f64> {
        let recent = ctx.features.get(K_AVG_LAST_3)?;
        let season = ctx.features.get(K_AVG_SEASON).filter(|s| *s > 0.0)?;
        Some(recent / season)
    };

    let hot = c.hot_ratio;
    rules.push(Rule::soft_adjust(
        "trend_hot",
        Factor::Directional {
            over: c.trend_boost,
            under: c.trend_reduce,
        },
        move |ctx| {
            trend(ctx)
                .filter(|r| *r >= hot)
                .map(|r| format!("trending up: last 3 at {r:.2}x season"))
        },
    ));

    let cold = c.cold_ratio;
    rules.push(Rule::soft_adjust(
        "trend_cold",
        Factor::Directional {
            over: c.trend_reduce,
            under: c.trend_boost,
        },
        move |ctx| {
            trend(ctx)
                .filter(|r| *r <= cold)
                .map(|r| format!("trending down: last 3 at {r:.2}x season"))
        },
    ));

    rules
}
