use thiserror::Error;

/// Main error type for the prediction core
#[derive(Error, Debug)]
pub enum KpropError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Model errors
    #[error("Model load failed for {model_id}: {reason}")]
    ModelLoad { model_id: String, reason: String },

    #[error("Model not configured: {0}")]
    ModelNotConfigured(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    // Feature errors
    #[error("Feature normalization failed: {0}")]
    FeatureNormalization(String),

    // Upstream data errors (degrade, never abort)
    #[error("Upstream unavailable: {source_name} - {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    #[error("Timed out after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl KpropError {
    pub fn model_load(model_id: impl Into<String>, reason: impl ToString) -> Self {
        KpropError::ModelLoad {
            model_id: model_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upstream(source_name: impl Into<String>, reason: impl ToString) -> Self {
        KpropError::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable category, carried on ERROR results.
    pub fn kind(&self) -> &'static str {
        match self {
            KpropError::Config(_) | KpropError::InvalidConfig(_) => "config",
            KpropError::ModelLoad { .. } | KpropError::ModelNotConfigured(_) => "model_load",
            KpropError::Scoring(_) => "scoring",
            KpropError::FeatureNormalization(_) => "feature_normalization",
            KpropError::UpstreamUnavailable { .. } | KpropError::Http(_) => "upstream_unavailable",
            KpropError::Timeout { .. } => "timeout",
            KpropError::Json(_) | KpropError::Validation(_) => "validation",
            KpropError::Io(_) => "io",
            KpropError::Internal(_) | KpropError::Other(_) => "internal",
        }
    }
}

/// Result type alias for KpropError
pub type Result<T> = std::result::Result<T, KpropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_message_names_model() {
        let err = KpropError::model_load("k_regressor_v2", "artifact missing");
        assert_eq!(err.kind(), "model_load");
        assert!(err.to_string().contains("k_regressor_v2"));
        assert!(err.to_string().contains("artifact missing"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: KpropError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
