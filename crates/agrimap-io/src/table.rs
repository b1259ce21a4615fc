//! Training table CSV: feature columns followed by the `Cluster` label.
//!
//! A JSON sidecar next to the table records the settings its feature columns
//! were computed with.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::IoError;

/// Header of the label column.
pub const LABEL_COLUMN: &str = "Cluster";

/// `training_data.csv` keeps its feature settings in `training_data.features.json`.
#[must_use]
pub fn feature_settings_path(table: &Path) -> PathBuf {
    table.with_extension("features.json")
}

/// Labeled feature rows as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTable {
    /// Feature column names, label column excluded.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Rows skipped for an empty or NaN feature, or a 0 label.
    pub n_dropped: usize,
}

/// Writes a [`TrainingTable`]-shaped CSV.
pub struct TrainingTableWriter {
    path: PathBuf,
}

impl TrainingTableWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write the header and one record per row; values use Rust's shortest
    /// round-trip formatting.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LabelCountMismatch`] | `rows` and `labels` differ in length |
    /// | [`IoError::OutputDirCreate`] | parent directory cannot be created |
    /// | [`IoError::CsvWrite`] | writing fails |
    #[instrument(skip_all, fields(path = %self.path.display(), n_rows = rows.len()))]
    pub fn write(&self, columns: &[String], rows: &[Vec<f64>], labels: &[usize]) -> Result<(), IoError> {
        if rows.len() != labels.len() {
            return Err(IoError::LabelCountMismatch {
                n_rows: rows.len(),
                n_labels: labels.len(),
            });
        }
        ensure_parent(&self.path)?;
        let csv_err = |source: csv::Error| IoError::CsvWrite {
            path: self.path.clone(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&self.path).map_err(csv_err)?;
        wtr.write_record(columns.iter().map(String::as_str).chain([LABEL_COLUMN]))
            .map_err(csv_err)?;
        for (row, label) in rows.iter().zip(labels) {
            wtr.write_record(row.iter().map(f64::to_string).chain([label.to_string()]))
                .map_err(csv_err)?;
        }
        wtr.flush().map_err(|source| IoError::WriteFile {
            path: self.path.clone(),
            source,
        })?;
        info!("training table written");
        Ok(())
    }

    /// Write `settings` to the table's sidecar and return its path.
    ///
    /// # Errors
    ///
    /// [`IoError::EncodeJson`] or [`IoError::WriteFile`].
    pub fn write_feature_settings<S: Serialize>(&self, settings: &S) -> Result<PathBuf, IoError> {
        let path = feature_settings_path(&self.path);
        let json = serde_json::to_string_pretty(settings).map_err(|source| IoError::EncodeJson {
            path: path.clone(),
            source,
        })?;
        ensure_parent(&path)?;
        std::fs::write(&path, json).map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "feature settings written");
        Ok(path)
    }
}

/// Reads and validates a training table CSV.
///
/// Rows with an empty or NaN feature cell, or label 0, are skipped and counted
/// rather than rejected; anything else malformed is an error.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::OpenFile`] | file cannot be opened |
/// | [`IoError::CsvParse`] | malformed CSV |
/// | [`IoError::MissingLabelColumn`] | last header cell is not `Cluster` |
/// | [`IoError::NoFeatureColumns`] | only the label column exists |
/// | [`IoError::InconsistentRowLength`] | row width differs from header |
/// | [`IoError::InvalidValue`] | feature cell is not a number |
/// | [`IoError::InvalidLabel`] | label is not a non-negative integer |
/// | [`IoError::EmptyTable`] | no rows survive |
pub struct TrainingTableReader {
    path: PathBuf,
}

impl TrainingTableReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TrainingTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|source| IoError::OpenFile {
            path: self.path.clone(),
            source,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let parse_err = |e: csv::Error| IoError::CsvParse {
            path: self.path.clone(),
            line: e.position().map_or(0, csv::Position::line),
            source: e,
        };

        let header: Vec<String> = rdr.headers().map_err(parse_err)?.iter().map(str::to_string).collect();
        match header.last() {
            Some(last) if last == LABEL_COLUMN => {}
            other => {
                return Err(IoError::MissingLabelColumn {
                    path: self.path.clone(),
                    expected: LABEL_COLUMN,
                    found: other.cloned().unwrap_or_default(),
                });
            }
        }
        let n_features = header.len() - 1;
        if n_features == 0 {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        debug!(n_features, "header validated");

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut n_dropped = 0;
        for (row_index, record) in rdr.records().enumerate() {
            let record = record.map_err(parse_err)?;
            if record.len() != header.len() {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: header.len(),
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(n_features);
            let mut complete = true;
            for (column, raw) in header.iter().zip(record.iter()).take(n_features) {
                if raw.is_empty() {
                    complete = false;
                    continue;
                }
                let value: f64 = raw.parse().map_err(|_| IoError::InvalidValue {
                    path: self.path.clone(),
                    row_index,
                    column: column.clone(),
                    raw: raw.to_string(),
                })?;
                complete &= !value.is_nan();
                row.push(value);
            }

            let raw_label = &record[n_features];
            let label = parse_label(raw_label).ok_or_else(|| IoError::InvalidLabel {
                path: self.path.clone(),
                row_index,
                raw: raw_label.to_string(),
            })?;

            if complete && label > 0 {
                rows.push(row);
                labels.push(label);
            } else {
                n_dropped += 1;
            }
        }

        if n_dropped > 0 {
            warn!(n_dropped, "rows with missing values or no label skipped");
        }
        if rows.is_empty() {
            return Err(IoError::EmptyTable {
                path: self.path.clone(),
            });
        }
        info!(n_rows = rows.len(), n_features, "training table read");
        Ok(TrainingTable {
            columns: header[..n_features].to_vec(),
            rows,
            labels,
            n_dropped,
        })
    }
}

impl TrainingTableReader {
    /// Settings from the table's sidecar, `None` when the table has none.
    ///
    /// # Errors
    ///
    /// [`IoError::OpenFile`] when the sidecar exists but cannot be read,
    /// [`IoError::ParseFeatureSettings`] when it does not hold an `S`.
    pub fn read_feature_settings<S: DeserializeOwned>(&self) -> Result<Option<S>, IoError> {
        let path = feature_settings_path(&self.path);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| IoError::OpenFile {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| IoError::ParseFeatureSettings { path, source })
    }
}

/// Accepts `3` and `3.0`.
fn parse_label(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().or_else(|| {
        let v: f64 = raw.parse().ok()?;
        (v >= 0.0 && v.fract() == 0.0 && v <= u8::MAX as f64).then_some(v as usize)
    })
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), IoError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| IoError::OutputDirCreate {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::{TrainingTableReader, TrainingTableWriter};
    use crate::IoError;

    fn write_raw(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("training_data.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn written_table_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed").join("training_data.csv");
        let columns = vec!["NDVI_Band_1".to_string(), "NDVI_Mean".to_string()];
        let rows = vec![vec![0.125, 0.3], vec![-0.5, 0.75]];
        TrainingTableWriter::new(&path).write(&columns, &rows, &[1, 4]).unwrap();

        let table = TrainingTableReader::new(&path).read().unwrap();
        assert_eq!(table.columns, columns);
        assert_eq!(table.rows, rows);
        assert_eq!(table.labels, vec![1, 4]);
        assert_eq!(table.n_dropped, 0);
    }

    #[test]
    fn feature_settings_sit_beside_the_table() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Settings {
            derived_band_count: usize,
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training_data.csv");
        let reader = TrainingTableReader::new(&path);
        assert_eq!(reader.read_feature_settings::<Settings>().unwrap(), None);

        let written = TrainingTableWriter::new(&path)
            .write_feature_settings(&Settings { derived_band_count: 2 })
            .unwrap();
        assert_eq!(written, dir.path().join("training_data.features.json"));
        assert_eq!(
            reader.read_feature_settings::<Settings>().unwrap(),
            Some(Settings { derived_band_count: 2 })
        );

        std::fs::write(&written, "{\"bands\": 2}").unwrap();
        assert!(matches!(
            reader.read_feature_settings::<Settings>(),
            Err(IoError::ParseFeatureSettings { .. })
        ));
    }

    #[test]
    fn header_ends_with_cluster() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        TrainingTableWriter::new(&path)
            .write(&["a".to_string()], &[vec![1.0]], &[2])
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("a,Cluster"));
    }

    #[test]
    fn incomplete_and_unlabeled_rows_counted() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,b,Cluster\n0.1,0.2,1\n,0.2,2\nNaN,0.1,3\n0.4,0.5,0\n0.3,0.3,2.0\n");
        let table = TrainingTableReader::new(&path).read().unwrap();
        assert_eq!(table.rows, vec![vec![0.1, 0.2], vec![0.3, 0.3]]);
        assert_eq!(table.labels, vec![1, 2]);
        assert_eq!(table.n_dropped, 3);
    }

    #[test]
    fn label_column_required() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,label\n0.1,1\n");
        assert!(matches!(
            TrainingTableReader::new(&path).read(),
            Err(IoError::MissingLabelColumn { .. })
        ));
    }

    #[test]
    fn garbage_value_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,Cluster\nhigh,1\n");
        match TrainingTableReader::new(&path).read().unwrap_err() {
            IoError::InvalidValue { column, raw, .. } => {
                assert_eq!(column, "a");
                assert_eq!(raw, "high");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fractional_label_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,Cluster\n0.1,1.5\n");
        assert!(matches!(TrainingTableReader::new(&path).read(), Err(IoError::InvalidLabel { .. })));
    }

    #[test]
    fn ragged_row_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,b,Cluster\n0.1,1\n");
        assert!(matches!(
            TrainingTableReader::new(&path).read(),
            Err(IoError::InconsistentRowLength { expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn all_rows_dropped_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(dir.path(), "a,Cluster\n,1\n");
        assert!(matches!(TrainingTableReader::new(&path).read(), Err(IoError::EmptyTable { .. })));
    }

    #[test]
    fn mismatched_labels_rejected_on_write() {
        let dir = TempDir::new().unwrap();
        let err = TrainingTableWriter::new(&dir.path().join("t.csv"))
            .write(&["a".to_string()], &[vec![1.0]], &[])
            .unwrap_err();
        assert!(matches!(err, IoError::LabelCountMismatch { n_rows: 1, n_labels: 0 }));
    }
}
