//! I/O error types for agrimap-io.

use std::path::PathBuf;

/// Errors from artifact files: tables, taxonomy, reports and preconditions.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a stage's input artifact does not exist.
    #[error("{what} not found: {path}{}", .hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default())]
    MissingInput {
        /// Human-readable artifact name.
        what: String,
        /// Expected location.
        path: PathBuf,
        /// How to produce the artifact, if known.
        hint: Option<String>,
    },

    /// Returned when a file exists but cannot be opened.
    #[error("cannot open {path}")]
    OpenFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at line {line}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// 1-based line number, 0 when unknown.
        line: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a training table lacks the trailing label column.
    #[error("{path}: last column must be \"{expected}\", found \"{found}\"")]
    MissingLabelColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// Required column name.
        expected: &'static str,
        /// Actual last header cell.
        found: String,
    },

    /// Returned when a training table has a label column but no feature columns.
    #[error("{path} has no feature columns")]
    NoFeatureColumns {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a table has zero usable data rows.
    #[error("no usable data rows in {path}")]
    EmptyTable {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of cells than the header.
    #[error("{path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based data row index.
        row_index: usize,
        /// Header width.
        expected: usize,
        /// Width of the offending row.
        got: usize,
    },

    /// Returned when a feature cell is not a number.
    #[error("{path}: row {row_index}, column \"{column}\" holds \"{raw}\", not a number")]
    InvalidValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based data row index.
        row_index: usize,
        /// Column name.
        column: String,
        /// Raw cell text.
        raw: String,
    },

    /// Returned when a label cell is not a non-negative integer.
    #[error("{path}: row {row_index} has label \"{raw}\", expected a non-negative integer")]
    InvalidLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based data row index.
        row_index: usize,
        /// Raw cell text.
        raw: String,
    },

    /// Returned when rows and labels handed to a writer disagree.
    #[error("{n_rows} rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Feature rows.
        n_rows: usize,
        /// Labels.
        n_labels: usize,
    },

    /// Returned when a taxonomy file is not valid JSON of the expected shape.
    #[error("invalid class taxonomy in {path}")]
    ParseTaxonomy {
        /// Taxonomy file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a training table's feature settings file is not valid JSON
    /// of the expected shape.
    #[error("invalid feature settings in {path}")]
    ParseFeatureSettings {
        /// Settings file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a taxonomy is empty, uses id 0 or repeats an id.
    #[error("invalid class taxonomy: {reason}")]
    InvalidTaxonomy {
        /// What is wrong.
        reason: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an output file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV writer fails.
    #[error("cannot write CSV {path}")]
    CsvWrite {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a report cannot be encoded as JSON.
    #[error("cannot encode {path} as JSON")]
    EncodeJson {
        /// Target path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}
