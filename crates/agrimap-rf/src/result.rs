//! What a training run hands back.

use serde::Serialize;

use crate::forest::RandomForest;
use crate::importance::RankedFeature;

/// Shape of a training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingMetadata {
    /// Trees in the ensemble.
    pub n_trees: usize,
    /// Columns per row.
    pub n_features: usize,
    /// Distinct class ids in the labels.
    pub n_classes: usize,
    /// Rows the forest was fitted on.
    pub n_samples: usize,
    /// Columns sampled per split after resolving `MaxFeatures`.
    pub max_features_resolved: usize,
}

/// A fitted forest with its ranked importances.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: Vec<RankedFeature>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            metadata,
        }
    }

    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Importances, most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
