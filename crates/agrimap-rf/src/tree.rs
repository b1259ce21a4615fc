use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::RfError;
use crate::node::{Node, NodeIndex};
use crate::split::{SplitCriterion, find_best_split};

/// Growth limits for a single CART tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default                 |
/// |---------------------|-------------------------|
/// | `criterion`         | `Gini`                  |
/// | `max_depth`         | `None` (unlimited)      |
/// | `min_samples_split` | 2                       |
/// | `min_samples_leaf`  | 1                       |
/// | `max_features`      | `None` (every column)   |
/// | `seed`              | 42                      |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a config with the defaults listed above.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Limit the depth; the root is depth 0.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of rows a node needs before a split is tried.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of rows allowed in each child.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set how many columns are sampled at each node.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the seed for column sampling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub(crate) fn validate(&self, n_features: usize) -> Result<usize, RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(max_features)
    }

    /// Fit a tree on row-major `features` with class-id `labels`.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no rows |
    /// | [`RfError::ZeroFeatures`] | rows have no columns |
    /// | [`RfError::LabelCountMismatch`] | `labels.len() != features.len()` |
    /// | [`RfError::FeatureCountMismatch`] | ragged rows |
    /// | [`RfError::NonFiniteValue`] | NaN or infinite cell |
    /// | config errors | see [`RfError`] |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        let n_features = validate_matrix(features, labels)?;
        let max_features = self.validate(n_features)?;
        let columns = to_columns(features, n_features);
        let n_classes = labels.iter().max().map_or(1, |&m| m + 1);
        Ok(self.grow(&columns, labels, (0..features.len()).collect(), n_classes, max_features))
    }

    /// Grow a tree over the given (possibly repeated) row indices of
    /// pre-validated column-major data.
    #[instrument(level = "trace", skip_all, fields(n_rows = rows.len()))]
    pub(crate) fn grow(
        &self,
        columns: &[Vec<f64>],
        labels: &[usize],
        rows: Vec<usize>,
        n_classes: usize,
        max_features: usize,
    ) -> DecisionTree {
        let mut builder = TreeBuilder {
            columns,
            labels,
            n_classes,
            max_features,
            config: self,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            nodes: Vec::new(),
        };
        builder.build(&rows, 0);
        debug!(n_nodes = builder.nodes.len(), "tree grown");
        DecisionTree {
            nodes: builder.nodes,
            n_features: columns.len(),
            n_classes,
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check shape and finiteness of a training matrix; returns the column count.
pub(crate) fn validate_matrix(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, RfError> {
    let Some(first) = features.first() else {
        return Err(RfError::EmptyDataset);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Transpose row-major rows into one vector per column.
pub(crate) fn to_columns(features: &[Vec<f64>], n_features: usize) -> Vec<Vec<f64>> {
    (0..n_features)
        .map(|f| features.iter().map(|row| row[f]).collect())
        .collect()
}

struct TreeBuilder<'a> {
    columns: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    max_features: usize,
    config: &'a DecisionTreeConfig,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: &[usize], depth: usize) -> NodeIndex {
        let n_samples = rows.len();
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.labels[r]] += 1;
        }
        let impurity = self.config.criterion.impurity(&counts, n_samples);

        let at_depth_limit = self.config.max_depth.is_some_and(|d| depth >= d);
        let split = if at_depth_limit || impurity.is_pure() || n_samples < self.config.min_samples_split {
            None
        } else {
            find_best_split(
                self.columns,
                self.labels,
                rows,
                self.n_classes,
                self.config.criterion,
                self.max_features,
                self.config.min_samples_leaf,
                &mut self.rng,
            )
        };

        let Some(split) = split else {
            let total = n_samples.max(1) as f64;
            let class_id = majority(&counts);
            self.nodes.push(Node::Leaf {
                class_id,
                distribution: counts.iter().map(|&c| c as f64 / total).collect(),
                impurity,
                n_samples,
            });
            return NodeIndex::new(self.nodes.len() - 1);
        };

        // Reserve the slot so children get later indices, then patch it.
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class_id: 0,
            distribution: Vec::new(),
            impurity,
            n_samples,
        });
        let left = self.build(&split.left, depth + 1);
        let right = self.build(&split.right, depth + 1);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(slot)
    }
}

/// Index of the largest count; ties resolve to the smallest class id.
fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = class;
        }
    }
    best
}

/// A fitted CART tree stored as a flat node arena rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class id of one row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when the row width differs
    /// from the training width.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        self.check_width(sample)?;
        Ok(self.leaf(sample).0)
    }

    /// Class frequencies of the leaf reached by one row.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a width mismatch.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], RfError> {
        self.check_width(sample)?;
        Ok(self.leaf(sample).1)
    }

    /// Mean decrease in impurity per column, normalized to sum to 1.
    ///
    /// A tree that never split returns all zeros.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Number of nodes, splits and leaves together.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Length of the longest root-to-leaf path; a lone leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => deepest = deepest.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        deepest
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Majority class and distribution of the leaf `sample` lands in.
    fn leaf(&self, sample: &[f64]) -> (usize, &[f64]) {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf {
                    class_id, distribution, ..
                } => return (*class_id, distribution),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}
