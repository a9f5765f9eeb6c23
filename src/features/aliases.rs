//! Static lookup tables used by the normalizer.
//!
//! Feature providers have changed their column names several times over the
//! seasons; the alias table maps every historical spelling onto one canonical
//! name. Order matters: when two raw keys map to the same canonical name,
//! the one listed first wins.

use super::names::*;

/// Raw provider key → canonical name, in precedence order
pub const ALIASES: &[(&str, &str)] = &[
    // strikeout outcomes
    ("season_k_avg", K_AVG_SEASON),
    ("k_per_start_season", K_AVG_SEASON),
    ("k_avg_l3", K_AVG_LAST_3),
    ("ks_last_3_avg", K_AVG_LAST_3),
    ("k_avg_l5", K_AVG_LAST_5),
    ("ks_last_5_avg", K_AVG_LAST_5),
    ("k_std_l10", K_STD_LAST_10),
    ("strikeout_std_last_10", K_STD_LAST_10),
    ("K/9", K_PER_9_SEASON),
    ("k9", K_PER_9_SEASON),
    ("season_k_per_9", K_PER_9_SEASON),
    // stuff / matchup
    ("SwStr%", SWSTR_PCT),
    ("swinging_strike_pct", SWSTR_PCT),
    ("CSW%", CSW_PCT),
    ("called_plus_swinging_pct", CSW_PCT),
    ("opp_k_pct", OPPONENT_K_RATE),
    ("opponent_strikeout_rate", OPPONENT_K_RATE),
    ("park_factor_k", PARK_K_FACTOR),
    // usage and workload
    ("gs", GAMES_STARTED_SEASON),
    ("games_started", GAMES_STARTED_SEASON),
    ("career_gs", CAREER_STARTS),
    ("starts_in_window", ROLLING_GAMES_COUNT),
    ("rolling_starts", ROLLING_GAMES_COUNT),
    ("avg_ip_last_5", AVG_INNINGS_LAST_5),
    ("ip_avg_last5", AVG_INNINGS_LAST_5),
    ("pitches_last_start", PITCH_COUNT_LAST_START),
    ("last_pitch_count", PITCH_COUNT_LAST_START),
    ("rest_days", DAYS_REST),
    ("days_since_last_start", DAYS_REST),
    // context flags
    ("home", IS_HOME),
    ("home_game", IS_HOME),
    ("day_game", IS_DAY_GAME),
    // data quality
    ("completeness_score", DATA_COMPLETENESS_SCORE),
    ("feature_completeness", DATA_COMPLETENESS_SCORE),
];

/// Canonical fields that are coerced to 1.0 / 0.0
pub const BOOLEAN_FIELDS: &[&str] = &[IS_HOME, IS_DAY_GAME, IS_LEFTY];

/// Raw keys carrying pitcher handedness as text ("L", "R", "LHP", ...)
pub const HANDEDNESS_SOURCES: &[&str] = &["throws", "pitcher_hand", "p_throws"];

/// One candidate in a fallback chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackSource {
    pub name: &'static str,
    /// Multiplier applied to the source value (proxies are rescaled)
    pub scale: f64,
}

const fn src(name: &'static str, scale: f64) -> FallbackSource {
    FallbackSource { name, scale }
}

/// Canonical name → candidates, rolling first, then season, then proxy
pub const FALLBACK_CHAINS: &[(&str, &[FallbackSource])] = &[
    (
        SWSTR_PCT,
        &[
            src("swstr_pct_last_5", 1.0),
            src("swstr_pct_season", 1.0),
            // whiff% is per swing; ~45% of pitches are swung at
            src("whiff_pct", 0.45),
        ],
    ),
    (
        OPPONENT_K_RATE,
        &[
            src("opp_k_rate_vs_hand", 1.0),
            src("opp_k_rate_last_30", 1.0),
            src("opp_k_rate_season", 1.0),
        ],
    ),
    (
        K_AVG_SEASON,
        &[
            src(K_AVG_LAST_5, 1.0),
            // a typical start is ~5.4 innings
            src(K_PER_9_SEASON, 0.6),
        ],
    ),
];

/// Explicit alias table plus the derived-field rules that go with it
#[derive(Debug, Clone)]
pub struct AliasTable {
    pub aliases: &'static [(&'static str, &'static str)],
    pub boolean_fields: &'static [&'static str],
    pub handedness_sources: &'static [&'static str],
    pub fallback_chains: &'static [(&'static str, &'static [FallbackSource])],
}

impl AliasTable {
    pub fn standard() -> Self {
        Self {
            aliases: ALIASES,
            boolean_fields: BOOLEAN_FIELDS,
            handedness_sources: HANDEDNESS_SOURCES,
            fallback_chains: FALLBACK_CHAINS,
        }
    }

    /// True for raw keys that must go through the alias table
    pub fn is_raw_alias(&self, key: &str) -> bool {
        self.aliases.iter().any(|(raw, _)| *raw == key)
            || self.handedness_sources.contains(&key)
    }

    pub fn is_boolean(&self, canonical: &str) -> bool {
        self.boolean_fields.contains(&canonical)
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::standard()
    }
}
