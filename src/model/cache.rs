//! Loaded-model cache.
//!
//! One `OnceCell` per model id: concurrent first callers share a single
//! fetch, later callers are cache hits. A failed or timed-out load leaves
//! the cell empty so the next call retries.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::artifact::ModelArtifact;
use super::store::ModelArtifactStore;
use crate::error::{KpropError, Result};

pub struct ModelCache {
    store: Arc<dyn ModelArtifactStore>,
    cells: DashMap<String, Arc<OnceCell<Arc<ModelArtifact>>>>,
    fetch_timeout: Duration,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ModelArtifactStore>, fetch_timeout: Duration) -> Self {
        Self {
            store,
            cells: DashMap::new(),
            fetch_timeout,
        }
    }

    /// Return the artifact for `model_id`, loading it on first use
    pub async fn get(&self, model_id: &str) -> Result<Arc<ModelArtifact>> {
        let cell = self.cells.entry(model_id.to_string()).or_default().clone();

        let artifact = cell
            .get_or_try_init(|| async {
                let started = Instant::now();
                let loaded = tokio::time::timeout(self.fetch_timeout, self.store.load(model_id))
                    .await
                    .map_err(|_| {
                        KpropError::model_load(
                            model_id,
                            KpropError::Timeout {
                                operation: "artifact fetch".to_string(),
                                elapsed_ms: self.fetch_timeout.as_millis() as u64,
                            },
                        )
                    })
                    .and_then(|r| r);

                match loaded {
                    Ok(artifact) => {
                        info!(
                            model_id,
                            kind = %artifact.version.kind,
                            runtime = artifact.estimator.runtime(),
                            features = artifact.schema.len(),
                            checksum = %artifact.version.checksum,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "model loaded"
                        );
                        Ok(Arc::new(artifact))
                    }
                    Err(e) => {
                        warn!(model_id, error = %e, "model load failed");
                        Err(match e {
                            KpropError::ModelLoad { .. } => e,
                            other => KpropError::model_load(model_id, other),
                        })
                    }
                }
            })
            .await?;

        Ok(Arc::clone(artifact))
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.cells
            .get(model_id)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Ids of successfully loaded models, sorted
    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .cells
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drop a cached model; the next `get` reloads it
    pub fn invalidate(&self, model_id: &str) -> bool {
        self.cells.remove(model_id).is_some()
    }
}
