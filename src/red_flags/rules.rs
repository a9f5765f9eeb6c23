//! Rule variants and the generic runner.
//!
//! Hard skips are checked before any soft adjustment regardless of where
//! they sit in the list, and the first hard skip that fires ends the run.

use serde::Serialize;
use tracing::debug;

use crate::domain::{Recommendation, Side};
use crate::features::ResolvedFeatures;

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub features: &'a ResolvedFeatures,
    pub recommendation: Recommendation,
    pub roster_unavailable: bool,
}

impl RuleContext<'_> {
    pub fn side(&self) -> Option<Side> {
        self.recommendation.side()
    }
}

/// Returns the flag text when the rule fires
pub type Predicate = Box<dyn Fn(&RuleContext<'_>) -> Option<String> + Send + Sync>;

/// How a soft rule scales confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Factor {
    /// Applies whatever the recommendation
    Uniform(f64),
    /// Applies only to OVER / UNDER; a 1.0 side is a no-op
    Directional { over: f64, under: f64 },
}

impl Factor {
    /// Factor for this recommendation, `None` when the rule does not apply
    pub fn for_recommendation(&self, recommendation: Recommendation) -> Option<f64> {
        match (self, recommendation.side()) {
            (Factor::Uniform(f), _) => Some(*f),
            (Factor::Directional { over, .. }, Some(Side::Over)) => Some(*over),
            (Factor::Directional { under, .. }, Some(Side::Under)) => Some(*under),
            (Factor::Directional { .. }, None) => None,
        }
        .filter(|f| (f - 1.0).abs() > f64::EPSILON)
    }
}

pub enum Rule {
    HardSkip {
        name: &'static str,
        predicate: Predicate,
    },
    SoftAdjust {
        name: &'static str,
        predicate: Predicate,
        factor: Factor,
    },
}

impl Rule {
    pub fn hard_skip<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Rule::HardSkip {
            name,
            predicate: Box::new(predicate),
        }
    }

    pub fn soft_adjust<F>(name: &'static str, factor: Factor, predicate: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Rule::SoftAdjust {
            name,
            predicate: Box::new(predicate),
            factor,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::HardSkip { name, .. } | Rule::SoftAdjust { name, .. } => name,
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::HardSkip { name, .. } => f.debug_struct("HardSkip").field("name", name).finish(),
            Rule::SoftAdjust { name, factor, .. } => f
                .debug_struct("SoftAdjust")
                .field("name", name)
                .field("factor", factor)
                .finish(),
        }
    }
}

/// Result of running the rule list once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedFlagOutcome {
    pub skip: bool,
    pub multiplier: f64,
    pub flags: Vec<String>,
    pub skip_reason: Option<String>,
}

impl RedFlagOutcome {
    pub fn clean() -> Self {
        Self {
            skip: false,
            multiplier: 1.0,
            flags: Vec::new(),
            skip_reason: None,
        }
    }

    fn skipped(reason: String) -> Self {
        Self {
            skip: true,
            multiplier: 0.0,
            flags: vec![reason.clone()],
            skip_reason: Some(reason),
        }
    }
}

pub fn run_rules(rules: &[Rule], ctx: &RuleContext<'_>, min_multiplier: f64) -> RedFlagOutcome {
    for rule in rules {
        if let Rule::HardSkip { predicate, .. } = rule {
            if let Some(reason) = predicate(ctx) {
                debug!(rule = rule.name(), %reason, "hard skip rule fired");
                return RedFlagOutcome::skipped(reason);
            }
        }
    }

    let mut outcome = RedFlagOutcome::clean();
    for rule in rules {
        let Rule::SoftAdjust {
            predicate, factor, ..
        } = rule
        else {
            continue;
        };
        let Some(f) = factor.for_recommendation(ctx.recommendation) else {
            continue;
        };
        if let Some(text) = predicate(ctx) {
            debug!(rule = rule.name(), factor = f, flag = %text, "soft rule applied");
            outcome.multiplier *= f;
            outcome.flags.push(text);
        }
    }

    outcome.multiplier = outcome.multiplier.max(min_multiplier);
    outcome
}
