use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the raw model output means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Expected strikeout count
    Regressor,
    /// P(actual > line)
    Classifier,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Regressor => "regressor",
            ModelKind::Classifier => "classifier",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity and provenance of a trained artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub id: String,
    pub kind: ModelKind,
    /// e.g. "mlp", "ridge", "xgboost"
    #[serde(default)]
    pub algorithm: Option<String>,
    /// e.g. "mae" or "log_loss"
    #[serde(default)]
    pub accuracy_metric: Option<String>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub trained_on: Option<NaiveDate>,
    /// Where the artifact was loaded from (path or URL)
    #[serde(default)]
    pub location: String,
    /// sha256 of the artifact bytes, hex encoded
    #[serde(default)]
    pub checksum: String,
}
