//! Ensemble inference.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;

/// Averaged leaf frequencies for one row, indexed by class id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Class id with the highest probability; ties go to the smaller id.
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        let mut best = 0;
        for (class_id, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = class_id;
            }
        }
        best
    }

    /// Probability assigned to `class_id`, 0 for ids the forest never saw.
    #[must_use]
    pub fn probability(&self, class_id: usize) -> f64 {
        self.probs.get(class_id).copied().unwrap_or(0.0)
    }

    /// Raw probabilities indexed by class id.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

impl RandomForest {
    /// Predict the class id of a single row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when the row width differs
    /// from the training width.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        Ok(self.predict_proba(sample)?.predicted_class())
    }

    /// Mean of the per-tree leaf distributions for a single row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a width mismatch.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut sum = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(sample)?) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        sum.iter_mut().for_each(|v| *v /= n);
        Ok(ClassDistribution::new(sum))
    }

    /// Predict every row in parallel, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RfError::PredictionFeatureMismatch`] encountered.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        features
            .into_par_iter()
            .map(|row| self.predict(row))
            .collect()
    }

    /// Training width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of distinct class ids seen in training.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.class_ids.len()
    }

    /// Distinct training class ids, ascending.
    #[must_use]
    pub fn class_ids(&self) -> &[usize] {
        &self.class_ids
    }

    /// Ensemble size.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Ordered feature names forming the model's input schema.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

#[cfg(test)]
mod tests {
    use super::ClassDistribution;

    #[test]
    fn tie_goes_to_smaller_class() {
        let d = ClassDistribution::new(vec![0.0, 0.4, 0.2, 0.4]);
        assert_eq!(d.predicted_class(), 1);
    }

    #[test]
    fn unknown_class_has_zero_probability() {
        let d = ClassDistribution::new(vec![0.0, 1.0]);
        assert_eq!(d.probability(1), 1.0);
        assert_eq!(d.probability(7), 0.0);
    }
}
