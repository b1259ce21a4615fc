use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based feature column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the column position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node inside a tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Impurity of a node under the configured criterion.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// True when the node holds a single class.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.0 <= 0.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// One node of a decision tree.
///
/// Children are referenced by [`NodeIndex`] into the owning tree's arena,
/// which keeps trees flat and serializable without pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Interior node: rows with `value <= threshold` descend left.
    Split {
        /// Column tested at this node.
        feature: FeatureIndex,
        /// Midpoint between the two neighbouring training values.
        threshold: f64,
        /// Left child.
        left: NodeIndex,
        /// Right child.
        right: NodeIndex,
        /// Impurity before the split.
        impurity: Impurity,
        /// Training rows that reached this node.
        n_samples: usize,
        /// Weighted impurity decrease credited to `feature`.
        impurity_decrease: f64,
    },
    /// Terminal node.
    Leaf {
        /// Majority class id.
        class_id: usize,
        /// Class frequencies, indexed by class id, summing to 1.
        distribution: Vec<f64>,
        /// Impurity of the leaf.
        impurity: Impurity,
        /// Training rows that reached this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the impurity stored on the node.
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training rows that reached the node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// True for terminal nodes.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
