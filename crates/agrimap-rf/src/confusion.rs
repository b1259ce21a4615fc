//! Confusion matrix over class ids with per-class scores.

use std::fmt;

use serde::Serialize;

use crate::error::RfError;

/// Counts of (true, predicted) pairs.
///
/// Rows and columns follow `class_ids`, the ascending union of every id seen
/// in either the true or predicted labels, so sparse ids such as `{1, 3, 4}`
/// produce a 3x3 matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    class_ids: Vec<usize>,
    counts: Vec<Vec<usize>>,
}

/// Precision, recall and F1 for one class id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class_id: usize,
    /// 0 when the class was never predicted.
    pub precision: f64,
    /// 0 when the class never occurs in the true labels.
    pub recall: f64,
    pub f1: f64,
    /// True occurrences of the class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally paired labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::LabelCountMismatch`] | slices differ in length |
    pub fn from_labels(truth: &[usize], predicted: &[usize]) -> Result<Self, RfError> {
        if truth.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if truth.len() != predicted.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: predicted.len(),
                n_labels: truth.len(),
            });
        }
        let mut class_ids: Vec<usize> = truth.iter().chain(predicted).copied().collect();
        class_ids.sort_unstable();
        class_ids.dedup();

        let mut counts = vec![vec![0; class_ids.len()]; class_ids.len()];
        for (t, p) in truth.iter().zip(predicted) {
            // Both ids are in `class_ids` by construction.
            if let (Ok(i), Ok(j)) = (class_ids.binary_search(t), class_ids.binary_search(p)) {
                counts[i][j] += 1;
            }
        }
        Ok(Self { class_ids, counts })
    }

    /// Element-wise sum, aligning on class ids.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut class_ids: Vec<usize> = self.class_ids.iter().chain(&other.class_ids).copied().collect();
        class_ids.sort_unstable();
        class_ids.dedup();
        let mut counts = vec![vec![0; class_ids.len()]; class_ids.len()];
        for m in [self, other] {
            for (i, t) in m.class_ids.iter().enumerate() {
                for (j, p) in m.class_ids.iter().enumerate() {
                    if let (Ok(a), Ok(b)) = (class_ids.binary_search(t), class_ids.binary_search(p)) {
                        counts[a][b] += m.counts[i][j];
                    }
                }
            }
        }
        Self { class_ids, counts }
    }

    #[must_use]
    pub fn class_ids(&self) -> &[usize] {
        &self.class_ids
    }

    /// Count of rows with true id `truth` predicted as `predicted`.
    #[must_use]
    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        match (self.class_ids.binary_search(&truth), self.class_ids.binary_search(&predicted)) {
            (Ok(i), Ok(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.class_ids.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Per-class scores in `class_ids` order.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.class_ids.len();
        (0..n)
            .map(|c| {
                let tp = self.counts[c][c];
                let predicted: usize = (0..n).map(|r| self.counts[r][c]).sum();
                let support: usize = self.counts[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class_id: self.class_ids[c],
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "true\\pred")?;
        for id in &self.class_ids {
            write!(f, "{id:>8}")?;
        }
        writeln!(f)?;
        for (id, row) in self.class_ids.iter().zip(&self.counts) {
            write!(f, "{id:>9}")?;
            for c in row {
                write!(f, "{c:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfusionMatrix;

    #[test]
    fn sparse_ids_are_compacted() {
        let cm = ConfusionMatrix::from_labels(&[1, 3, 4, 4], &[1, 4, 4, 4]).unwrap();
        assert_eq!(cm.class_ids(), &[1, 3, 4]);
        assert_eq!(cm.count(3, 4), 1);
        assert_eq!(cm.count(4, 4), 2);
        assert_eq!(cm.count(2, 2), 0);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn metrics_for_unpredicted_class() {
        let cm = ConfusionMatrix::from_labels(&[1, 2, 2], &[1, 1, 1]).unwrap();
        let m = cm.class_metrics();
        assert_eq!(m[1].class_id, 2);
        assert_eq!(m[1].precision, 0.0);
        assert_eq!(m[1].recall, 0.0);
        assert_eq!(m[1].support, 2);
        assert!((m[0].precision - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(m[0].recall, 1.0);
    }

    #[test]
    fn merge_aligns_ids() {
        let a = ConfusionMatrix::from_labels(&[1, 2], &[1, 2]).unwrap();
        let b = ConfusionMatrix::from_labels(&[3], &[2]).unwrap();
        let m = a.merge(&b);
        assert_eq!(m.class_ids(), &[1, 2, 3]);
        assert_eq!(m.total(), 3);
        assert_eq!(m.count(3, 2), 1);
    }

    #[test]
    fn empty_and_mismatched_rejected() {
        assert!(ConfusionMatrix::from_labels(&[], &[]).is_err());
        assert!(ConfusionMatrix::from_labels(&[1, 2], &[1]).is_err());
    }
}
