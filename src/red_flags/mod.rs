//! Rule-based overrides: hard skips and confidence adjustments.

pub mod config;
pub mod policy;
pub mod rules;

pub use config::{RedFlagConfig, SignalThreshold};
pub use policy::{standard_rules, RedFlagPolicy};
pub use rules::{run_rules, Factor, RedFlagOutcome, Rule, RuleContext};
