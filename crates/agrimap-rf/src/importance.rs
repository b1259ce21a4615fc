//! Impurity-based feature importance across the ensemble.

use serde::Serialize;

/// One column's share of the ensemble's total impurity decrease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    /// Column name from the training schema.
    pub name: String,
    /// Normalized importance; all entries sum to 1 unless no tree split.
    pub importance: f64,
    /// 1-based rank, 1 being the most important.
    pub rank: usize,
}

/// Average per-tree importances and rank them, most important first.
///
/// Equal scores keep schema order.
pub(crate) fn aggregate_importances(per_tree: &[Vec<f64>], names: &[String]) -> Vec<RankedFeature> {
    let mut totals = vec![0.0; names.len()];
    for tree in per_tree {
        for (acc, v) in totals.iter_mut().zip(tree) {
            *acc += v;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }

    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(totals)
        .map(|(name, importance)| RankedFeature {
            name: name.clone(),
            importance,
            rank: 0,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, f) in ranked.iter_mut().enumerate() {
        f.rank = i + 1;
    }
    ranked
}
