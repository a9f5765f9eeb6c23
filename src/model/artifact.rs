//! On-disk / on-wire artifact format.
//!
//! ```json
//! {
//!   "metadata": { "id": "k_regressor_v2", "kind": "regressor", "algorithm": "mlp",
//!                 "accuracy_metric": "mae", "accuracy": 1.58, "trained_on": "2024-03-01" },
//!   "schema":   { "version": "2024.1", "features": [ { "name": "k_avg_season", "default": 5.0 } ] },
//!   "model":    { "format": "dense", "input_dim": 1, "layers": [ ... ] }
//! }
//! ```
//!
//! ONNX graphs live next to the document: `"model": { "format": "onnx",
//! "file": "k_classifier_v3.onnx", "sha256": "..." }`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::version::{ModelKind, ModelVersion};
use crate::error::{KpropError, Result};
use crate::features::FeatureSchema;
use crate::ml::{DenseNetwork, Estimator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub accuracy_metric: Option<String>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub trained_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ModelPayload {
    Dense(DenseNetwork),
    Onnx {
        file: String,
        #[serde(default)]
        sha256: Option<String>,
    },
}

impl ModelPayload {
    /// Relative key of a blob stored next to the document, if any
    pub fn external_file(&self) -> Option<&str> {
        match self {
            ModelPayload::Dense(_) => None,
            ModelPayload::Onnx { file, .. } => Some(file),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument {
    pub metadata: ArtifactMetadata,
    pub schema: FeatureSchema,
    pub model: ModelPayload,
}

impl ArtifactDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A loaded model: identity, schema and evaluator
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub version: ModelVersion,
    pub schema: FeatureSchema,
    pub estimator: Estimator,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl ModelArtifact {
    /// Validate a parsed document and build the estimator.
    ///
    /// `raw` is the document bytes (checksummed); `blob` holds the external
    /// model file when the payload references one.
    pub fn assemble(
        model_id: &str,
        doc: ArtifactDocument,
        location: String,
        raw: &[u8],
        blob: Option<Vec<u8>>,
    ) -> Result<Self> {
        if doc.metadata.id != model_id {
            return Err(KpropError::model_load(
                model_id,
                format!("artifact declares id {}", doc.metadata.id),
            ));
        }

        let estimator = match doc.model {
            ModelPayload::Dense(net) => {
                net.validate()
                    .map_err(|e| KpropError::model_load(model_id, e))?;
                Estimator::Dense(net)
            }
            ModelPayload::Onnx { file, sha256 } => {
                let bytes = blob.ok_or_else(|| {
                    KpropError::model_load(model_id, format!("missing model file {file}"))
                })?;
                if let Some(expected) = sha256 {
                    let actual = sha256_hex(&bytes);
                    if !actual.eq_ignore_ascii_case(&expected) {
                        return Err(KpropError::model_load(
                            model_id,
                            format!("checksum mismatch for {file}: {actual} != {expected}"),
                        ));
                    }
                }
                onnx_estimator(model_id, &bytes, doc.schema.len())?
            }
        };

        if estimator.input_dim() != doc.schema.len() {
            return Err(KpropError::model_load(
                model_id,
                format!(
                    "estimator expects {} inputs but schema has {} features",
                    estimator.input_dim(),
                    doc.schema.len()
                ),
            ));
        }

        let meta = doc.metadata;
        Ok(Self {
            version: ModelVersion {
                id: meta.id,
                kind: meta.kind,
                algorithm: meta.algorithm,
                accuracy_metric: meta.accuracy_metric,
                accuracy: meta.accuracy,
                trained_on: meta.trained_on,
                location,
                checksum: sha256_hex(raw),
            },
            schema: doc.schema,
            estimator,
        })
    }
}

#[cfg(feature = "onnx")]
fn onnx_estimator(model_id: &str, bytes: &[u8], input_dim: usize) -> Result<Estimator> {
    crate::ml::OnnxModel::from_bytes(bytes, input_dim)
        .map(Estimator::Onnx)
        .map_err(|e| KpropError::model_load(model_id, e))
}

#[cfg(not(feature = "onnx"))]
fn onnx_estimator(model_id: &str, _bytes: &[u8], _input_dim: usize) -> Result<Estimator> {
    Err(KpropError::model_load(
        model_id,
        "onnx artifact but kprop was built without the `onnx` feature",
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    /// Linear regressor over (k_avg_season, opponent_k_rate)
    pub fn regressor_doc(id: &str) -> serde_json::Value {
        json!({
            "metadata": { "id": id, "kind": "regressor", "algorithm": "ridge",
                          "accuracy_metric": "mae", "accuracy": 1.6 },
            "schema": { "version": "test", "features": [
                { "name": "k_avg_season", "default": 5.0 },
                { "name": "opponent_k_rate", "default": 0.22 }
            ]},
            "model": { "format": "dense", "input_dim": 2,
                       "layers": [ { "weights": [[1.0, 0.0]], "bias": [0.0] } ] }
        })
    }

    /// Logistic classifier: p = sigmoid(w * k_avg_season + b)
    pub fn classifier_doc(id: &str, weight: f64, bias: f64) -> serde_json::Value {
        json!({
            "metadata": { "id": id, "kind": "classifier" },
            "schema": { "features": [ { "name": "k_avg_season", "default": 5.0 } ] },
            "model": { "format": "dense", "input_dim": 1,
                       "layers": [ { "weights": [[weight]], "bias": [bias], "activation": "sigmoid" } ] }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(value: serde_json::Value, id: &str) -> Result<ModelArtifact> {
        let raw = serde_json::to_vec(&value).unwrap();
        let doc = ArtifactDocument::from_slice(&raw)?;
        ModelArtifact::assemble(id, doc, "mem://".to_string(), &raw, None)
    }

    #[test]
    fn dense_artifact_loads_with_checksum() {
        let artifact = assemble(fixtures::regressor_doc("k_regressor_v2"), "k_regressor_v2").unwrap();
        assert_eq!(artifact.version.kind, ModelKind::Regressor);
        assert_eq!(artifact.version.checksum.len(), 64);
        assert_eq!(artifact.schema.len(), 2);
        assert_eq!(artifact.estimator.evaluate(&[6.5, 0.2]).unwrap(), 6.5);
    }

    #[test]
    fn id_mismatch_is_rejected() {
        let err = assemble(fixtures::regressor_doc("k_regressor_v1"), "k_regressor_v2").unwrap_err();
        assert!(matches!(err, KpropError::ModelLoad { .. }));
    }

    #[test]
    fn schema_width_must_match_estimator() {
        let mut doc = fixtures::regressor_doc("m");
        doc["schema"]["features"] = serde_json::json!([{ "name": "k_avg_season" }]);
        assert!(assemble(doc, "m").is_err());
    }

    #[test]
    fn duplicate_schema_names_fail_parsing() {
        let mut doc = fixtures::regressor_doc("m");
        doc["schema"]["features"] = serde_json::json!([
            { "name": "k_avg_season" }, { "name": "k_avg_season" }
        ]);
        assert!(assemble(doc, "m").is_err());
    }

    #[test]
    fn onnx_payload_without_blob_fails() {
        let doc = serde_json::json!({
            "metadata": { "id": "m", "kind": "classifier" },
            "schema": { "features": [ { "name": "k_avg_season" } ] },
            "model": { "format": "onnx", "file": "m.onnx" }
        });
        assert!(matches!(assemble(doc, "m"), Err(KpropError::ModelLoad { .. })));
    }
}
