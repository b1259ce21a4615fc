//! Stratified k-fold cross-validation.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::RandomForestConfig;
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;

/// Fraction of positions where `truth` and `predicted` agree; 0 for empty input.
#[must_use]
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Stratified k-fold settings.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Per-fold and aggregate accuracy of a cross-validation run.
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidationResult {
    /// Held-out accuracy of each fold, in fold order.
    pub fold_accuracies: Vec<f64>,
    pub mean_accuracy: f64,
    /// Population standard deviation of the fold accuracies.
    pub std_accuracy: f64,
    /// Held-out predictions of every fold tallied together.
    pub confusion_matrix: ConfusionMatrix,
    pub n_folds: usize,
    pub n_samples: usize,
}

impl CrossValidation {
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds < 2`.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Seed for the per-class shuffles.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Assign each row to a fold so every class is spread evenly across folds.
    ///
    /// Rows of each class are shuffled then dealt round-robin, continuing the
    /// rotation from where the previous class stopped.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::TooFewSamplesForFolds`] | even the largest class has fewer rows than folds |
    pub fn assign_folds(&self, labels: &[usize]) -> Result<Vec<usize>, RfError> {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &c) in labels.iter().enumerate() {
            by_class.entry(c).or_default().push(i);
        }
        let Some((&largest, rows)) = by_class.iter().max_by_key(|(_, rows)| rows.len()) else {
            return Err(RfError::EmptyDataset);
        };
        if rows.len() < self.n_folds {
            return Err(RfError::TooFewSamplesForFolds {
                class: largest,
                count: rows.len(),
                n_folds: self.n_folds,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds = vec![0; labels.len()];
        let mut next = 0;
        for (class, mut rows) in by_class {
            if rows.len() < self.n_folds {
                warn!(class, count = rows.len(), n_folds = self.n_folds, "class smaller than fold count");
            }
            rows.shuffle(&mut rng);
            for row in rows {
                folds[row] = next % self.n_folds;
                next += 1;
            }
        }
        Ok(folds)
    }

    /// Train on k-1 folds and score the remaining one, k times.
    ///
    /// Each fold's forest uses the config seed offset by the fold index.
    ///
    /// # Errors
    ///
    /// Fold assignment errors plus any training or prediction error.
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        if features.len() != labels.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }
        let folds = self.assign_folds(labels)?;

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);
        let mut confusion: Option<ConfusionMatrix> = None;

        for fold in 0..self.n_folds {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| folds[i] == fold);
            let train_x: Vec<Vec<f64>> = train.iter().map(|&i| features[i].clone()).collect();
            let train_y: Vec<usize> = train.iter().map(|&i| labels[i]).collect();
            let test_x: Vec<Vec<f64>> = test.iter().map(|&i| features[i].clone()).collect();
            let test_y: Vec<usize> = test.iter().map(|&i| labels[i]).collect();

            let forest = config
                .clone()
                .with_seed(config.seed().wrapping_add(fold as u64))
                .fit(&train_x, &train_y, feature_names)?
                .into_forest();
            let predicted = forest.predict_batch(&test_x)?;

            let fold_accuracy = accuracy(&test_y, &predicted);
            info!(fold, accuracy = fold_accuracy, n_test = test_y.len(), "fold scored");
            fold_accuracies.push(fold_accuracy);

            let fold_cm = ConfusionMatrix::from_labels(&test_y, &predicted)?;
            confusion = Some(match confusion {
                Some(acc) => acc.merge(&fold_cm),
                None => fold_cm,
            });
        }

        let n = fold_accuracies.len() as f64;
        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / n;
        let std_accuracy =
            (fold_accuracies.iter().map(|a| (a - mean_accuracy).powi(2)).sum::<f64>() / n).sqrt();
        info!(mean_accuracy, std_accuracy, "cross-validation finished");

        Ok(CrossValidationResult {
            fold_accuracies,
            mean_accuracy,
            std_accuracy,
            confusion_matrix: confusion.ok_or(RfError::EmptyDataset)?,
            n_folds: self.n_folds,
            n_samples: labels.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CrossValidation, accuracy};
    use crate::config::RandomForestConfig;
    use crate::error::RfError;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[1, 2, 3, 4], &[1, 2, 0, 0]), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn folds_are_stratified() {
        let labels: Vec<usize> = (0..50).map(|i| 1 + i % 2).collect();
        let folds = CrossValidation::new(5).unwrap().assign_folds(&labels).unwrap();
        for fold in 0..5 {
            let ones = (0..50).filter(|&i| folds[i] == fold && labels[i] == 1).count();
            let twos = (0..50).filter(|&i| folds[i] == fold && labels[i] == 2).count();
            assert_eq!(ones, 5);
            assert_eq!(twos, 5);
        }
    }

    #[test]
    fn fold_assignment_is_seeded() {
        let labels: Vec<usize> = (0..40).map(|i| 1 + i % 4).collect();
        let a = CrossValidation::new(5).unwrap().with_seed(3).assign_folds(&labels).unwrap();
        let b = CrossValidation::new(5).unwrap().with_seed(3).assign_folds(&labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_rows_for_folds() {
        let err = CrossValidation::new(5).unwrap().assign_folds(&[1, 1, 2]).unwrap_err();
        assert!(matches!(err, RfError::TooFewSamplesForFolds { class: 1, count: 2, n_folds: 5 }));
    }

    #[test]
    fn fold_count_validated() {
        assert!(matches!(CrossValidation::new(1), Err(RfError::InvalidFoldCount { n_folds: 1 })));
    }

    #[test]
    fn evaluate_separable_data() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, base) in [(1usize, 0.0), (2, 10.0)] {
            for i in 0..15 {
                features.push(vec![base + i as f64 * 0.1]);
                labels.push(class);
            }
        }
        let names = vec!["x".to_string()];
        let config = RandomForestConfig::new(10).unwrap();
        let cv = CrossValidation::new(5).unwrap().evaluate(&config, &features, &labels, &names).unwrap();
        assert_eq!(cv.fold_accuracies.len(), 5);
        assert!((cv.mean_accuracy - 1.0).abs() < 1e-12);
        assert!(cv.std_accuracy.abs() < 1e-12);
        assert_eq!(cv.confusion_matrix.total(), 30);
    }
}
