//! Versioned model artifact with the feature schema embedded.
//!
//! The forest carries its ordered feature columns and class ids. Next to it
//! the envelope stores caller-defined feature settings, the parameters that
//! produced those columns, so a predictor can recompute them identically.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::RandomForest;

const FORMAT_VERSION: u32 = 2;

#[derive(Serialize)]
struct EnvelopeRef<'a, S> {
    format_version: u32,
    settings: &'a S,
    forest: &'a RandomForest,
}

#[derive(Deserialize)]
struct Envelope<S> {
    format_version: u32,
    settings: S,
    forest: RandomForest,
}

impl RandomForest {
    /// Write the forest, its schema and `settings` as a bincode file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::SerializeModel`] | encoding failed |
    /// | [`RfError::WriteModel`] | the file could not be written |
    #[instrument(skip(self, settings), fields(path = %path.as_ref().display()))]
    pub fn save<S: Serialize>(&self, path: impl AsRef<Path>, settings: &S) -> Result<(), RfError> {
        let path = path.as_ref();
        let bytes = bincode::serialize(&EnvelopeRef {
            format_version: FORMAT_VERSION,
            settings,
            forest: self,
        })
        .map_err(|source| RfError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| RfError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;
        info!(size_bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Read a forest and the settings it was saved with by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ReadModel`] | the file could not be read |
    /// | [`RfError::IncompatibleModelVersion`] | written by another format version |
    /// | [`RfError::DeserializeModel`] | the bytes are not a model with settings of type `S` |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load<S: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(Self, S), RfError> {
        let path = path.as_ref();
        let deserialize_err = |source| RfError::DeserializeModel {
            path: path.to_path_buf(),
            source,
        };
        let bytes = std::fs::read(path).map_err(|source| RfError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let format_version: u32 = bincode::deserialize(&bytes).map_err(deserialize_err)?;
        if format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: format_version,
                path: path.to_path_buf(),
            });
        }
        let envelope: Envelope<S> = bincode::deserialize(&bytes).map_err(deserialize_err)?;
        let forest = envelope.forest;
        debug!(
            format_version = envelope.format_version,
            n_trees = forest.trees.len(),
            features = ?forest.feature_names,
            classes = ?forest.class_ids,
            "model loaded"
        );
        Ok((forest, envelope.settings))
    }

    /// Require `columns` to equal the training columns, name for name and in order.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::SchemaMismatch`] at the first position that differs,
    /// including a missing or surplus trailing column.
    pub fn check_schema(&self, columns: &[String]) -> Result<(), RfError> {
        let width = self.feature_names.len().max(columns.len());
        for position in 0..width {
            let expected = self.feature_names.get(position);
            let found = columns.get(position);
            if expected != found {
                return Err(RfError::SchemaMismatch {
                    position,
                    expected: expected.cloned(),
                    found: found.cloned(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    use crate::config::RandomForestConfig;
    use crate::error::RfError;
    use crate::forest::RandomForest;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        derived_bands: usize,
        sample_std: bool,
    }

    const SETTINGS: Settings = Settings {
        derived_bands: 3,
        sample_std: true,
    };

    fn names() -> Vec<String> {
        vec!["NDVI_Mean".to_string(), "NDVI_Range".to_string()]
    }

    fn model() -> RandomForest {
        let features: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![if i < 6 { 0.1 } else { 0.7 } + i as f64 * 0.01, 0.2])
            .collect();
        let labels: Vec<usize> = (0..12).map(|i| if i < 6 { 2 } else { 4 }).collect();
        RandomForestConfig::new(6)
            .unwrap()
            .fit(&features, &labels, &names())
            .unwrap()
            .into_forest()
    }

    #[test]
    fn saved_model_predicts_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rf_model.bin");
        let forest = model();
        forest.save(&path, &SETTINGS).unwrap();
        let (loaded, settings) = RandomForest::load::<Settings>(&path).unwrap();

        assert_eq!(settings, SETTINGS);
        assert_eq!(loaded.feature_names(), names().as_slice());
        assert_eq!(loaded.class_ids(), &[2, 4]);
        for sample in [[0.12, 0.2], [0.5, 0.2], [0.9, 0.2]] {
            assert_eq!(forest.predict(&sample).unwrap(), loaded.predict(&sample).unwrap());
            assert_eq!(forest.predict_proba(&sample).unwrap(), loaded.predict_proba(&sample).unwrap());
        }
    }

    #[test]
    fn other_format_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.bin");
        let mut bytes = bincode::serialize(&1u32).unwrap();
        bytes.extend(bincode::serialize(&model()).unwrap());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            RandomForest::load::<Settings>(&path).unwrap_err(),
            RfError::IncompatibleModelVersion { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn schema_accepts_identical_columns() {
        assert!(model().check_schema(&names()).is_ok());
    }

    #[test]
    fn schema_rejects_reordered_columns() {
        let reordered = vec!["NDVI_Range".to_string(), "NDVI_Mean".to_string()];
        let err = model().check_schema(&reordered).unwrap_err();
        assert!(matches!(err, RfError::SchemaMismatch { position: 0, .. }));
    }

    #[test]
    fn schema_rejects_extra_column() {
        let mut extra = names();
        extra.push("NDVI_Std".to_string());
        match model().check_schema(&extra).unwrap_err() {
            RfError::SchemaMismatch { position, expected, found } => {
                assert_eq!(position, 2);
                assert_eq!(expected, None);
                assert_eq!(found.as_deref(), Some("NDVI_Std"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load::<Settings>(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, RfError::ReadModel { .. }));
    }

    #[test]
    fn garbage_is_deserialize_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"\x01\x02").unwrap();
        assert!(matches!(
            RandomForest::load::<Settings>(&path).unwrap_err(),
            RfError::DeserializeModel { .. }
        ));
    }
}
