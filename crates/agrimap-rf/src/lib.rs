//! Random Forest pixel classifier: train, validate, persist, predict.
//!
//! Bagged CART trees grown in parallel with rayon, a stratified hold-out
//! split, stratified k-fold cross-validation for diagnostics, mean decrease
//! in impurity importances, and a versioned model artifact that carries the
//! ordered feature schema it was trained on.

mod config;
mod confusion;
mod error;
mod eval;
mod forest;
mod holdout;
mod importance;
mod node;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;

pub use config::{MaxFeatures, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult, accuracy};
pub use forest::RandomForest;
pub use holdout::{HoldoutSplit, TrainTestSplit, TrainingOutcome, train_and_validate};
pub use importance::RankedFeature;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
