//! JSON summaries of the training and prediction stages.
//!
//! The artifact structs hold plain values so this crate stays independent of
//! the classifier and raster crates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;

/// One column's importance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportanceEntry {
    pub name: String,
    pub importance: f64,
    pub rank: usize,
}

/// Precision, recall and F1 of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScoreEntry {
    pub class_id: usize,
    pub crop_type: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Confusion counts with the class id of each row and column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionEntry {
    pub class_ids: Vec<usize>,
    /// `counts[true][predicted]`.
    pub counts: Vec<Vec<usize>>,
}

/// Everything the training stage reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub table: String,
    pub model: String,
    pub feature_columns: Vec<String>,
    pub n_samples: usize,
    pub n_dropped: usize,
    pub class_distribution: BTreeMap<usize, usize>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
    pub fold_accuracies: Vec<f64>,
    pub cv_mean_accuracy: f64,
    pub cv_std_accuracy: f64,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub feature_importances: Vec<FeatureImportanceEntry>,
    pub test_confusion: ConfusionEntry,
    pub class_metrics: Vec<ClassScoreEntry>,
}

/// Area of one predicted class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassAreaEntry {
    pub class_id: u8,
    pub crop_type: String,
    pub color: Option<String>,
    pub pixel_count: usize,
    pub area_ha: f64,
}

/// Everything the prediction stage reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub model: String,
    pub raster: String,
    pub output: String,
    pub rows: usize,
    pub cols: usize,
    pub epsg: Option<u16>,
    /// How pixels with a missing band value were treated.
    pub missing_policy: String,
    /// Pixels whose features were imputed or which were forced to background.
    pub n_missing: usize,
    pub pixel_area_ha: f64,
    pub classes: Vec<ClassAreaEntry>,
}

/// Writes stage summaries as pretty JSON under one directory.
///
/// Files are `training_report.json` and `prediction_report.json`.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Create the writer, creating `output_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(fields(dir = %output_dir.display()))]
    pub fn new(output_dir: &Path) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|source| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source,
        })?;
        debug!("report directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// # Errors
    ///
    /// [`IoError::EncodeJson`] or [`IoError::WriteFile`].
    pub fn write_training_report(&self, summary: &TrainingSummary) -> Result<PathBuf, IoError> {
        self.write_json("training_report.json", summary)
    }

    /// # Errors
    ///
    /// [`IoError::EncodeJson`] or [`IoError::WriteFile`].
    pub fn write_prediction_report(&self, summary: &PredictionSummary) -> Result<PathBuf, IoError> {
        self.write_json("prediction_report.json", summary)
    }

    #[instrument(skip(self, value))]
    fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf, IoError> {
        let path = self.output_dir.join(file_name);
        let json = serde_json::to_string_pretty(value).map_err(|source| IoError::EncodeJson {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::{ClassAreaEntry, ConfusionEntry, PredictionSummary, ReportWriter, TrainingSummary};

    #[test]
    fn training_report_is_json() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(&dir.path().join("reports")).unwrap();
        let summary = TrainingSummary {
            table: "training_data.csv".into(),
            model: "rf_model.bin".into(),
            feature_columns: vec!["NDVI_Mean".into()],
            n_samples: 10,
            n_dropped: 0,
            class_distribution: BTreeMap::from([(1, 6), (2, 4)]),
            n_train: 8,
            n_test: 2,
            n_trees: 100,
            max_depth: Some(10),
            min_samples_split: 5,
            seed: 42,
            fold_accuracies: vec![1.0, 0.5],
            cv_mean_accuracy: 0.75,
            cv_std_accuracy: 0.25,
            train_accuracy: 1.0,
            test_accuracy: 0.5,
            feature_importances: vec![],
            test_confusion: ConfusionEntry {
                class_ids: vec![1, 2],
                counts: vec![vec![1, 0], vec![1, 0]],
            },
            class_metrics: vec![],
        };
        let path = writer.write_training_report(&summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["cv_mean_accuracy"], 0.75);
        assert_eq!(value["class_distribution"]["1"], 6);
        assert_eq!(value["max_depth"], 10);
    }

    #[test]
    fn prediction_report_lists_classes() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path()).unwrap();
        let summary = PredictionSummary {
            model: "rf_model.bin".into(),
            raster: "ndvi.tif".into(),
            output: "prediction.tif".into(),
            rows: 2,
            cols: 2,
            epsg: Some(4326),
            missing_policy: "fill_zero".into(),
            n_missing: 0,
            pixel_area_ha: 1.0,
            classes: vec![ClassAreaEntry {
                class_id: 4,
                crop_type: "Fallow / Barren Land".into(),
                color: Some("#e7298a".into()),
                pixel_count: 4,
                area_ha: 4.0,
            }],
        };
        let path = writer.write_prediction_report(&summary).unwrap();
        assert!(path.ends_with("prediction_report.json"));
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["classes"][0]["crop_type"], "Fallow / Barren Land");
    }
}
