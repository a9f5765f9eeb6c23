//! Single-model and ensemble prediction pipelines.

pub mod ensemble;
pub mod single;

pub use ensemble::{
    combine, normalize_weights, Combination, ComponentOutcome, EnsembleComponent,
    EnsembleCombiner, EnsembleConfig,
};
pub use single::{PredictorState, SinglePredictor};

use std::sync::Arc;

use crate::features::FeatureNormalizer;
use crate::model::ModelCache;
use crate::red_flags::RedFlagPolicy;
use crate::roster::RosterStatusProvider;
use crate::scoring::ConfidenceScorer;

/// Collaborators shared by every predictor in a process
pub struct PredictionContext {
    pub cache: Arc<ModelCache>,
    pub normalizer: FeatureNormalizer,
    pub scorer: ConfidenceScorer,
    pub policy: RedFlagPolicy,
    pub roster: Arc<dyn RosterStatusProvider>,
}

impl PredictionContext {
    pub fn new(
        cache: Arc<ModelCache>,
        scorer: ConfidenceScorer,
        policy: RedFlagPolicy,
        roster: Arc<dyn RosterStatusProvider>,
    ) -> Self {
        Self {
            cache,
            normalizer: FeatureNormalizer::default(),
            scorer,
            policy,
            roster,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::artifact::fixtures;
    use crate::model::InMemoryArtifactStore;
    use crate::roster::NoRosterChecks;
    use std::time::Duration;

    /// Context over in-memory artifacts:
    /// - `reg_a`, `reg_b`: regressors predicting k_avg_season unchanged
    /// - `clf`: logistic classifier on k_avg_season
    pub fn context() -> Arc<PredictionContext> {
        let mut store = InMemoryArtifactStore::new();
        store.insert_json("reg_a", &fixtures::regressor_doc("reg_a")).unwrap();
        store.insert_json("reg_b", &fixtures::regressor_doc("reg_b")).unwrap();
        store
            .insert_json("clf", &fixtures::classifier_doc("clf", 1.0, 0.0))
            .unwrap();

        let cache = Arc::new(ModelCache::new(Arc::new(store), Duration::from_secs(5)));
        Arc::new(PredictionContext::new(
            cache,
            ConfidenceScorer::default(),
            RedFlagPolicy::default(),
            Arc::new(NoRosterChecks),
        ))
    }
}
