//! Canonical feature names.
//!
//! Schemas of every model generation are written in terms of these names;
//! raw provider keys are mapped onto them by the alias table.

// Strikeout outcomes
pub const K_AVG_SEASON: &str = "k_avg_season";
pub const K_AVG_LAST_3: &str = "k_avg_last_3";
pub const K_AVG_LAST_5: &str = "k_avg_last_5";
pub const K_STD_LAST_10: &str = "k_std_last_10";
pub const K_PER_9_SEASON: &str = "k_per_9_season";

// Stuff / matchup
pub const SWSTR_PCT: &str = "swstr_pct";
pub const CSW_PCT: &str = "csw_pct";
pub const OPPONENT_K_RATE: &str = "opponent_k_rate";
pub const PARK_K_FACTOR: &str = "park_k_factor";

// Usage and workload
pub const GAMES_STARTED_SEASON: &str = "games_started_season";
pub const CAREER_STARTS: &str = "career_starts";
pub const ROLLING_GAMES_COUNT: &str = "rolling_games_count";
pub const AVG_INNINGS_LAST_5: &str = "avg_innings_last_5";
pub const PITCH_COUNT_LAST_START: &str = "pitch_count_last_start";
pub const DAYS_REST: &str = "days_rest";

// Context flags
pub const IS_HOME: &str = "is_home";
pub const IS_DAY_GAME: &str = "is_day_game";
pub const IS_LEFTY: &str = "is_lefty";

// Data quality
pub const DATA_COMPLETENESS_SCORE: &str = "data_completeness_score";
