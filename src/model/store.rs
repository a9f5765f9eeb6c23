//! Artifact stores.
//!
//! A store only knows how to fetch bytes by key; parsing, checksum and
//! validation are shared in [`ModelArtifactStore::load`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::artifact::{ArtifactDocument, ModelArtifact};
use crate::config::{StoreConfig, StoreKind};
use crate::error::{KpropError, Result};

#[async_trait]
pub trait ModelArtifactStore: Send + Sync {
    /// Raw bytes for `key` (`<model_id>.json` or a referenced model file)
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Human-readable location of `key`, recorded on the model version
    fn location(&self, key: &str) -> String;

    async fn load(&self, model_id: &str) -> Result<ModelArtifact> {
        validate_key(model_id)?;
        let key = format!("{model_id}.json");
        let raw = self
            .fetch(&key)
            .await
            .map_err(|e| KpropError::model_load(model_id, e))?;
        let doc = ArtifactDocument::from_slice(&raw)
            .map_err(|e| KpropError::model_load(model_id, e))?;

        let blob = match doc.model.external_file() {
            Some(file) => {
                validate_key(file)?;
                Some(
                    self.fetch(file)
                        .await
                        .map_err(|e| KpropError::model_load(model_id, e))?,
                )
            }
            None => None,
        };

        ModelArtifact::assemble(model_id, doc, self.location(&key), &raw, blob)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.contains("..") {
        return Err(KpropError::Validation(format!("invalid artifact key: {key:?}")));
    }
    Ok(())
}

/// Build the store described by config
pub fn store_from_config(config: &StoreConfig) -> Result<Box<dyn ModelArtifactStore>> {
    match config.kind {
        StoreKind::Fs => Ok(Box::new(FsArtifactStore::new(&config.root))),
        StoreKind::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                KpropError::InvalidConfig("store.base_url is required for http stores".to_string())
            })?;
            Ok(Box::new(HttpArtifactStore::new(
                base_url,
                Duration::from_millis(config.fetch_timeout_ms),
            )?))
        }
    }
}

/// Artifacts under a local directory: `<root>/<model_id>.json`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ModelArtifactStore for FsArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.root.join(key);
        debug!(path = %path.display(), "reading model artifact");
        Ok(tokio::fs::read(&path).await?)
    }

    fn location(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

/// Artifacts served over HTTP(S): `<base_url>/<model_id>.json`
#[derive(Debug, Clone)]
pub struct HttpArtifactStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpArtifactStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kprop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KpropError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelArtifactStore for HttpArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.location(key);
        debug!(%url, "fetching model artifact");
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    fn location(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Artifacts held in memory, keyed like the filesystem store
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, bytes: Vec<u8>) {
        self.blobs.insert(key.to_string(), bytes);
    }

    /// Store a JSON document as `<model_id>.json`
    pub fn insert_json(&mut self, model_id: &str, doc: &serde_json::Value) -> Result<()> {
        self.insert(&format!("{model_id}.json"), serde_json::to_vec(doc)?);
        Ok(())
    }
}

#[async_trait]
impl ModelArtifactStore for InMemoryArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs.get(key).cloned().ok_or_else(|| {
            KpropError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no artifact {key}"),
            ))
        })
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}
