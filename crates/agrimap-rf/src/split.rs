use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::node::{FeatureIndex, Impurity};

/// Node impurity measure used to rank candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: `1 - Σ p²`.
    Gini,
    /// Shannon entropy in nats: `-Σ p ln p`.
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node with the given per-class counts.
    ///
    /// An empty node is treated as pure.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let proportions = class_counts.iter().filter(|&&c| c > 0).map(|&c| c as f64 / n);
        let value = match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        };
        Impurity::new(value.max(0.0))
    }
}

/// The winning split of a node and the partition it induces.
#[derive(Debug, Clone)]
pub(crate) struct BestSplit {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// `n·I(parent) - n_l·I(left) - n_r·I(right)`.
    pub(crate) impurity_decrease: f64,
    pub(crate) left: Vec<usize>,
    pub(crate) right: Vec<usize>,
}

/// Search a random subset of `max_features` columns for the split with the
/// largest weighted impurity decrease.
///
/// `columns[feature][row]` is column-major; `rows` indexes into the inner
/// vectors and may contain repeats (bootstrap draws).
///
/// Returns `None` when every candidate column is constant over `rows` or
/// every boundary would leave a child below `min_samples_leaf`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    labels: &[usize],
    rows: &[usize],
    n_classes: usize,
    criterion: SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<BestSplit> {
    let n_features = columns.len();
    let n = rows.len();
    if n < 2 || n_features == 0 {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &r in rows {
        parent_counts[labels[r]] += 1;
    }
    let weighted_parent = n as f64 * criterion.impurity(&parent_counts, n).value();

    // Partial Fisher-Yates over column positions.
    let mut candidates: Vec<usize> = (0..n_features).collect();
    let take = max_features.clamp(1, n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        candidates.swap(i, j);
    }

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

    for &feature in &candidates[..take] {
        let column = &columns[feature];
        sorted.clear();
        sorted.extend(rows.iter().map(|&r| (column[r], labels[r])));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        if sorted[0].0 == sorted[n - 1].0 {
            continue;
        }

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..n - 1 {
            let (value, class) = sorted[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = weighted_parent
                - n_left as f64 * criterion.impurity(&left_counts, n_left).value()
                - n_right as f64 * criterion.impurity(&right_counts, n_right).value();

            if best.is_none_or(|(_, _, d)| decrease > d) {
                best = Some((feature, (value + next) / 2.0, decrease));
            }
        }
    }

    let (feature, threshold, impurity_decrease) = best?;
    let column = &columns[feature];
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().partition(|&&r| column[r] <= threshold);

    Some(BestSplit {
        feature: FeatureIndex::new(feature),
        threshold,
        impurity_decrease,
        left,
        right,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn gini_of_pure_node_is_zero() {
        let imp = SplitCriterion::Gini.impurity(&[0, 12, 0, 0, 0], 12);
        assert!(imp.is_pure());
    }

    #[test]
    fn gini_of_four_balanced_classes() {
        let imp = SplitCriterion::Gini.impurity(&[0, 5, 5, 5, 5], 20);
        assert!((imp.value() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn entropy_of_two_balanced_classes() {
        let imp = SplitCriterion::Entropy.impurity(&[0, 8, 8], 16);
        assert!((imp.value() - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn separates_two_ndvi_regimes() {
        // Bare soil near zero, irrigated paddy near 0.8.
        let columns = vec![vec![0.02, 0.05, 0.08, 0.71, 0.78, 0.83]];
        let labels = vec![4, 4, 4, 1, 1, 1];
        let rows: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let split = find_best_split(&columns, &labels, &rows, 5, SplitCriterion::Gini, 1, 1, &mut rng)
            .expect("a boundary exists");
        assert_eq!(split.feature.index(), 0);
        assert!(split.threshold > 0.08 && split.threshold < 0.71);
        assert_eq!(split.left, vec![0, 1, 2]);
        assert_eq!(split.right, vec![3, 4, 5]);
    }

    #[test]
    fn constant_column_has_no_split() {
        let columns = vec![vec![0.4; 4]];
        let labels = vec![1, 2, 1, 2];
        let rows: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(
            find_best_split(&columns, &labels, &rows, 3, SplitCriterion::Gini, 1, 1, &mut rng)
                .is_none()
        );
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let columns = vec![vec![0.1, 0.9]];
        let labels = vec![1, 2];
        let rows = vec![0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(
            find_best_split(&columns, &labels, &rows, 3, SplitCriterion::Gini, 1, 2, &mut rng)
                .is_none()
        );
    }

    #[test]
    fn repeated_bootstrap_rows_are_partitioned_together() {
        let columns = vec![vec![0.1, 0.2, 0.9]];
        let labels = vec![1, 1, 2];
        let rows = vec![0, 0, 1, 2, 2];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let split = find_best_split(&columns, &labels, &rows, 3, SplitCriterion::Gini, 1, 1, &mut rng)
            .expect("split exists");
        assert_eq!(split.left, vec![0, 0, 1]);
        assert_eq!(split.right, vec![2, 2]);
    }
}
