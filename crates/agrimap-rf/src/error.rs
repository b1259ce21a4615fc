use std::path::PathBuf;

/// Errors from forest configuration, training, validation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The rejected tree count.
        n_trees: usize,
    },

    /// Returned when max_depth is `Some(0)`.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The rejected depth.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The rejected value.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The rejected value.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves outside `[1, n_features]`.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved value.
        max_features: usize,
        /// Number of feature columns in the dataset.
        n_features: usize,
    },

    /// Returned when bootstrap_fraction is not in (0.0, 1.0].
    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when the hold-out fraction is not strictly between 0 and 1.
    #[error("test fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidTestFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The rejected fold count.
        n_folds: usize,
    },

    /// Returned when a dataset has zero rows.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when a dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the label vector and the feature rows differ in length.
    #[error("{n_labels} labels supplied for {n_samples} feature rows")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_samples: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when the feature names do not cover every column.
    #[error("{n_names} feature names supplied for {n_features} feature columns")]
    FeatureNameCountMismatch {
        /// Number of feature columns.
        n_features: usize,
        /// Number of names.
        n_names: usize,
    },

    /// Returned when a training row has a different width than the first row.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        got: usize,
        /// Zero-based index of the offending row.
        sample_index: usize,
    },

    /// Returned when a prediction row has the wrong width.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// Width the model was trained on.
        expected: usize,
        /// Width of the supplied row.
        got: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// Zero-based row index.
        sample_index: usize,
        /// Zero-based column index.
        feature_index: usize,
    },

    /// Returned when a class has fewer samples than the number of folds.
    #[error("class {class} has only {count} samples, need at least {n_folds} for stratified CV")]
    TooFewSamplesForFolds {
        /// The under-represented class id.
        class: usize,
        /// Its sample count.
        count: usize,
        /// Requested folds.
        n_folds: usize,
    },

    /// Returned when the hold-out split leaves the training or test side empty.
    #[error("stratified split produced {n_train} training and {n_test} test samples")]
    DegenerateSplit {
        /// Rows assigned to training.
        n_train: usize,
        /// Rows assigned to testing.
        n_test: usize,
    },

    /// Returned when prediction columns differ from the columns the model was trained on.
    #[error("feature schema mismatch at column {position}: model expects {expected:?}, input has {found:?}")]
    SchemaMismatch {
        /// Zero-based column position of the first difference.
        position: usize,
        /// Column name the model was trained with (`None` past the end).
        expected: Option<String>,
        /// Column name supplied for prediction (`None` past the end).
        found: Option<String>,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// Underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Model file path.
        path: PathBuf,
        /// Underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Model file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Model file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a model file was written by an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
        /// Model file path.
        path: PathBuf,
    },
}
