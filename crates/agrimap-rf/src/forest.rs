//! Bagged tree training.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, to_columns, validate_matrix};

/// A fitted ensemble together with the schema it was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
    /// Distinct class ids present in the training labels, ascending.
    pub(crate) class_ids: Vec<usize>,
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_matrix(features, labels)?;
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameCountMismatch {
            n_features,
            n_names: feature_names.len(),
        });
    }
    let max_features = config.max_features.resolve(n_features)?;
    if !(config.bootstrap_fraction > 0.0 && config.bootstrap_fraction <= 1.0) {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));
    tree_config.validate(n_features)?;

    let n_samples = features.len();
    let n_classes = labels.iter().max().map_or(1, |&m| m + 1);
    let mut class_ids: Vec<usize> = labels.to_vec();
    class_ids.sort_unstable();
    class_ids.dedup();
    let draws = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_samples,
        n_features,
        n_classes = class_ids.len(),
        max_features,
        draws,
        "training random forest"
    );

    let columns = to_columns(features, n_features);

    // Seeds are drawn up front so the ensemble is independent of thread scheduling.
    let mut master = ChaCha8Rng::seed_from_u64(config.seed);
    let seeds: Vec<(u64, u64)> = (0..config.n_trees)
        .map(|_| (master.r#gen(), master.r#gen()))
        .collect();

    let trees: Vec<DecisionTree> = seeds
        .into_par_iter()
        .map(|(bootstrap_seed, tree_seed)| {
            let mut rng = ChaCha8Rng::seed_from_u64(bootstrap_seed);
            let rows: Vec<usize> = (0..draws).map(|_| rng.gen_range(0..n_samples)).collect();
            tree_config
                .clone()
                .with_seed(tree_seed)
                .grow(&columns, labels, rows, n_classes, max_features)
        })
        .collect();

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);

    let metadata = TrainingMetadata {
        n_trees: trees.len(),
        n_features,
        n_classes: class_ids.len(),
        n_samples,
        max_features_resolved: max_features,
    };

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        feature_names: feature_names.to_vec(),
        class_ids,
    };
    info!(n_trees = forest.trees.len(), "random forest trained");

    Ok(RandomForestResult::new(forest, importances, metadata))
}
