//! Builder for forest hyper-parameters.

use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::SplitCriterion;

/// How many columns each node samples when searching for a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_features))`.
    Sqrt,
    /// `ceil(log2(n_features))`, at least 1.
    Log2,
    /// `ceil(fraction * n_features)`.
    Fraction(f64),
    /// An explicit count.
    Fixed(usize),
    /// Every column.
    All,
}

impl MaxFeatures {
    /// Resolve against a concrete column count.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidMaxFeatures`] when the result is 0 or exceeds `n_features`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Hyper-parameters for a bagged decision-tree ensemble.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
/// The defaults are the ones the crop classifier is tuned with.
///
/// # Defaults
///
/// | Parameter            | Default |
/// |----------------------|---------|
/// | `max_features`       | `Sqrt`  |
/// | `max_depth`          | 10      |
/// | `min_samples_split`  | 5       |
/// | `min_samples_leaf`   | 1       |
/// | `criterion`          | `Gini`  |
/// | `seed`               | 42      |
/// | `bootstrap_fraction` | 1.0     |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// Default ensemble size.
    pub const DEFAULT_TREES: usize = 100;

    /// Create a config with `n_trees` trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            seed: 42,
            bootstrap_fraction: 1.0,
        })
    }

    /// Set the per-node column sampling strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the depth limit; `None` grows until leaves are pure.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum rows a node needs before it may split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum rows per child.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the split criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the master seed from which every tree seed is derived.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the bootstrap draw size as a fraction of the training rows.
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Depth limit.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Minimum rows to split.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Master seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest on row-major `features` with class-id `labels`.
    ///
    /// `feature_names` must name every column in order; the names become the
    /// model's schema and are checked again at prediction time.
    ///
    /// # Errors
    ///
    /// Input shape errors ([`RfError::EmptyDataset`], [`RfError::ZeroFeatures`],
    /// [`RfError::LabelCountMismatch`], [`RfError::FeatureCountMismatch`],
    /// [`RfError::FeatureNameCountMismatch`], [`RfError::NonFiniteValue`]) and
    /// configuration errors.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}
