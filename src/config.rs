use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::predictor::EnsembleConfig;
use crate::red_flags::RedFlagConfig;
use crate::scoring::ConfidenceConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    /// Per-model-version calibration, keyed by model id
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelCalibration>,
    /// Model used by single-model predictions when none is named
    #[serde(default = "default_model_id")]
    pub default_model: String,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub red_flags: RedFlagConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where trained artifacts are fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Fs,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,
    /// Artifact directory for the `fs` store
    #[serde(default = "default_store_root")]
    pub root: String,
    /// Base URL for the `http` store (e.g. a public bucket prefix)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bound on a single artifact fetch + parse
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_store_kind() -> StoreKind {
    StoreKind::Fs
}

fn default_store_root() -> String {
    "models".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            root: default_store_root(),
            base_url: None,
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    /// Injured-list feed URL. No URL means no roster checks (never unavailable).
    #[serde(default)]
    pub url: Option<String>,
    /// How long a fetched roster snapshot is trusted
    #[serde(default = "default_roster_ttl_secs")]
    pub ttl_secs: u64,
    /// Bound on a single roster fetch
    #[serde(default = "default_roster_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_roster_ttl_secs() -> u64 {
    900
}

fn default_roster_timeout_ms() -> u64 {
    3_000
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            url: None,
            ttl_secs: default_roster_ttl_secs(),
            timeout_ms: default_roster_timeout_ms(),
        }
    }
}

/// Calibration for one model generation.
///
/// Different generations were trained on different feature sets and
/// calibrate differently, so edge/confidence floors live per version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelCalibration {
    /// Starting point for the confidence scorer
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
    /// Minimum |edge| in strikeouts to recommend a side
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    /// Minimum confidence (0-100) to recommend a side
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Plausible range for regressor output
    #[serde(default)]
    pub value_floor: f64,
    #[serde(default = "default_value_ceiling")]
    pub value_ceiling: f64,
    /// Classifier: P(over) at or above this recommends OVER
    #[serde(default = "default_over_probability")]
    pub over_probability: f64,
    /// Classifier: P(over) at or below this recommends UNDER
    #[serde(default = "default_under_probability")]
    pub under_probability: f64,
    /// Classifier: estimate anchor when no line is known and the feature set
    /// carries no season average
    #[serde(default = "default_baseline")]
    pub baseline: f64,
}

fn default_base_confidence() -> f64 {
    70.0
}

fn default_min_edge() -> f64 {
    0.5
}

fn default_min_confidence() -> f64 {
    60.0
}

fn default_value_ceiling() -> f64 {
    20.0
}

fn default_over_probability() -> f64 {
    0.53
}

fn default_under_probability() -> f64 {
    0.47
}

fn default_baseline() -> f64 {
    5.0
}

impl Default for ModelCalibration {
    fn default() -> Self {
        Self {
            base_confidence: default_base_confidence(),
            min_edge: default_min_edge(),
            min_confidence: default_min_confidence(),
            value_floor: 0.0,
            value_ceiling: default_value_ceiling(),
            over_probability: default_over_probability(),
            under_probability: default_under_probability(),
            baseline: default_baseline(),
        }
    }
}

impl ModelCalibration {
    fn validate(&self, model_id: &str, errors: &mut Vec<String>) {
        if !(0.0..=100.0).contains(&self.base_confidence) {
            errors.push(format!("models.{model_id}.base_confidence must be in [0, 100]"));
        }
        if !self.min_edge.is_finite() || self.min_edge < 0.0 {
            errors.push(format!("models.{model_id}.min_edge must be >= 0"));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            errors.push(format!("models.{model_id}.min_confidence must be in [0, 100]"));
        }
        if self.value_floor >= self.value_ceiling {
            errors.push(format!(
                "models.{model_id}.value_floor must be below value_ceiling"
            ));
        }
        if !(0.0 < self.under_probability
            && self.under_probability <= 0.5
            && 0.5 <= self.over_probability
            && self.over_probability < 1.0)
        {
            errors.push(format!(
                "models.{model_id}: need 0 < under_probability <= 0.5 <= over_probability < 1"
            ));
        }
    }
}

fn default_models() -> BTreeMap<String, ModelCalibration> {
    let mut models = BTreeMap::new();
    // First generation: fewer features, needs a full strikeout of edge
    models.insert(
        "k_regressor_v1".to_string(),
        ModelCalibration {
            base_confidence: 65.0,
            min_edge: 1.0,
            ..ModelCalibration::default()
        },
    );
    models.insert("k_regressor_v2".to_string(), ModelCalibration::default());
    models.insert("k_classifier_v3".to_string(), ModelCalibration::default());
    models
}

fn default_model_id() -> String {
    "k_regressor_v2".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent subjects in a batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            roster: RosterConfig::default(),
            models: default_models(),
            default_model: default_model_id(),
            ensemble: EnsembleConfig::default(),
            confidence: ConfidenceConfig::default(),
            red_flags: RedFlagConfig::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("worker.max_concurrency", 8)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("KPROP_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (KPROP_STORE__ROOT, etc.)
            .add_source(
                Environment::with_prefix("KPROP")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load a single explicit TOML file layered over defaults and environment
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(
                Environment::with_prefix("KPROP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn calibration(&self, model_id: &str) -> Option<&ModelCalibration> {
        self.models.get(model_id)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.models.is_empty() {
            errors.push("at least one model must be configured".to_string());
        }
        for (model_id, calibration) in &self.models {
            calibration.validate(model_id, &mut errors);
        }
        if !self.models.contains_key(&self.default_model) {
            errors.push(format!(
                "default_model {} has no [models] entry",
                self.default_model
            ));
        }

        for component in &self.ensemble.components {
            if !self.models.contains_key(&component.model_id) {
                errors.push(format!(
                    "ensemble component {} has no [models] entry",
                    component.model_id
                ));
            }
        }
        errors.extend(self.ensemble.validate());
        errors.extend(self.red_flags.validate());

        if self.store.kind == StoreKind::Http && self.store.base_url.is_none() {
            errors.push("store.base_url is required for the http store".to_string());
        }
        if self.store.fetch_timeout_ms == 0 {
            errors.push("store.fetch_timeout_ms must be positive".to_string());
        }
        if self.roster.ttl_secs == 0 {
            errors.push("roster.ttl_secs must be positive".to_string());
        }
        if self.roster.timeout_ms == 0 {
            errors.push("roster.timeout_ms must be positive".to_string());
        }
        if self.worker.max_concurrency == 0 {
            errors.push("worker.max_concurrency must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
        assert_eq!(config.calibration("k_regressor_v1").unwrap().min_edge, 1.0);
        assert_eq!(config.calibration("k_regressor_v2").unwrap().min_edge, 0.5);
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = AppConfig::default();
        config.default_model = "missing".to_string();
        config.worker.max_concurrency = 0;
        config.store.kind = StoreKind::Http;

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("default_model")));
        assert!(errors.iter().any(|e| e.contains("max_concurrency")));
        assert!(errors.iter().any(|e| e.contains("base_url")));
    }

    #[test]
    fn load_file_overrides_calibration() {
        let dir = std::env::temp_dir().join(format!("kprop_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
default_model = "k_regressor_v2"

[models.k_regressor_v2]
min_edge = 0.75
base_confidence = 72.0

[red_flags]
min_multiplier = 0.4
"#,
        )
        .unwrap();

        let config = AppConfig::load_file(&path).unwrap();
        let cal = config.calibration("k_regressor_v2").unwrap();
        assert_eq!(cal.min_edge, 0.75);
        assert_eq!(cal.base_confidence, 72.0);
        assert_eq!(cal.min_confidence, 60.0);
        assert_eq!(config.red_flags.min_multiplier, 0.4);
        assert_eq!(config.worker.max_concurrency, 8);

        std::fs::remove_dir_all(&dir).ok();
    }
}
