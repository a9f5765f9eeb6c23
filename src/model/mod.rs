//! Trained model artifacts: formats, stores, cache and scoring backends.

pub mod artifact;
pub mod backend;
pub mod cache;
pub mod store;
pub mod version;

pub use artifact::{ArtifactDocument, ArtifactMetadata, ModelArtifact, ModelPayload};
pub use backend::{backend_for, ClassifierBackend, ModelBackend, RegressorBackend, ScoredOutput};
pub use cache::ModelCache;
pub use store::{
    store_from_config, FsArtifactStore, HttpArtifactStore, InMemoryArtifactStore,
    ModelArtifactStore,
};
pub use version::{ModelKind, ModelVersion};
