//! Artifact files shared by the agrimap stages.
//!
//! Training-table CSV, the crop class taxonomy, per-region area CSV, JSON
//! stage reports and the missing-input check every stage runs first.

mod error;
mod precondition;
mod report;
mod table;
mod taxonomy;
mod zonal_csv;

pub use error::IoError;
pub use precondition::require_input;
pub use report::{
    ClassAreaEntry, ClassScoreEntry, ConfusionEntry, FeatureImportanceEntry, PredictionSummary, ReportWriter,
    TrainingSummary,
};
pub use table::{LABEL_COLUMN, TrainingTable, TrainingTableReader, TrainingTableWriter, feature_settings_path};
pub use taxonomy::{ClassEntry, ClassTaxonomy};
pub use zonal_csv::{ZonalRecord, write_zonal_csv};
