//! Stratified train/test hold-out and the full training procedure.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::eval::{CrossValidation, CrossValidationResult, accuracy};
use crate::forest::RandomForest;
use crate::importance::RankedFeature;
use crate::result::TrainingMetadata;

/// Stratified hold-out settings.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    test_fraction: f64,
    seed: u64,
}

/// Row indices on each side of a hold-out split, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTestFraction`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64) -> Result<Self, RfError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(RfError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        Ok(Self {
            test_fraction,
            seed: 42,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Split row indices so each class keeps its proportion on both sides.
    ///
    /// A class with `n` rows sends `round(n * test_fraction)` of them to the
    /// test side, clamped to `[1, n - 1]` when `n >= 2`. A singleton class
    /// stays entirely in training.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::DegenerateSplit`] | one side ends up empty |
    pub fn split(&self, labels: &[usize]) -> Result<HoldoutSplit, RfError> {
        if labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &c) in labels.iter().enumerate() {
            by_class.entry(c).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(labels.len());
        let mut test = Vec::new();
        for mut rows in by_class.into_values() {
            rows.shuffle(&mut rng);
            let n = rows.len();
            let n_test = if n >= 2 {
                ((n as f64 * self.test_fraction).round() as usize).clamp(1, n - 1)
            } else {
                0
            };
            test.extend_from_slice(&rows[..n_test]);
            train.extend_from_slice(&rows[n_test..]);
        }
        if train.is_empty() || test.is_empty() {
            return Err(RfError::DegenerateSplit {
                n_train: train.len(),
                n_test: test.len(),
            });
        }
        train.sort_unstable();
        test.sort_unstable();
        Ok(HoldoutSplit { train, test })
    }
}

/// Everything produced by [`train_and_validate`].
#[derive(Debug)]
pub struct TrainingOutcome {
    /// Forest fitted on the whole training side.
    pub forest: RandomForest,
    /// k-fold diagnostics computed on the training side only.
    pub cross_validation: CrossValidationResult,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    /// Hold-out predictions against hold-out truth.
    pub test_confusion: ConfusionMatrix,
    pub importances: Vec<RankedFeature>,
    pub metadata: TrainingMetadata,
    pub n_train: usize,
    pub n_test: usize,
}

/// Hold out a stratified test set, cross-validate on the rest, then fit the
/// final forest on the whole training side and score both sides.
///
/// Cross-validation is diagnostic only; it never alters the final fit.
///
/// # Errors
///
/// Any error from splitting, cross-validation, training or prediction.
#[instrument(skip_all, fields(n_samples = features.len()))]
pub fn train_and_validate(
    config: &RandomForestConfig,
    holdout: &TrainTestSplit,
    cv: &CrossValidation,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<TrainingOutcome, RfError> {
    if features.len() != labels.len() {
        return Err(RfError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    let split = holdout.split(labels)?;
    let pick = |rows: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
        rows.iter().map(|&i| (features[i].clone(), labels[i])).unzip()
    };
    let (train_x, train_y) = pick(&split.train);
    let (test_x, test_y) = pick(&split.test);
    info!(n_train = train_y.len(), n_test = test_y.len(), "stratified hold-out split");

    let cross_validation = cv.evaluate(config, &train_x, &train_y, feature_names)?;

    let result = config.fit(&train_x, &train_y, feature_names)?;
    let importances = result.importances().to_vec();
    let metadata = result.metadata().clone();
    let forest = result.into_forest();

    let train_accuracy = accuracy(&train_y, &forest.predict_batch(&train_x)?);
    let test_predicted = forest.predict_batch(&test_x)?;
    let test_accuracy = accuracy(&test_y, &test_predicted);
    let test_confusion = ConfusionMatrix::from_labels(&test_y, &test_predicted)?;
    info!(train_accuracy, test_accuracy, "final forest scored");

    Ok(TrainingOutcome {
        forest,
        cross_validation,
        train_accuracy,
        test_accuracy,
        test_confusion,
        importances,
        metadata,
        n_train: split.train.len(),
        n_test: split.test.len(),
    })
}
