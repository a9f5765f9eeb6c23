//! Feature schemas, aliasing, and normalization.

pub mod aliases;
pub mod names;
pub mod normalizer;
pub mod provider;
pub mod schema;

pub use aliases::{AliasTable, FallbackSource};
pub use normalizer::{FeatureNormalizer, NormalizedVector, ResolvedFeatures};
pub use provider::{FeatureProvider, InMemoryFeatureProvider, JsonDirFeatureProvider};
pub use schema::{FeatureSchema, FeatureSpec};
