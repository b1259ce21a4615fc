//! Missing-input check each stage runs before touching its artifacts.

use std::path::Path;

use crate::IoError;

/// Fail fast with a readable message when a stage's input artifact is absent.
///
/// # Errors
///
/// Returns [`IoError::MissingInput`] when `path` does not exist.
pub fn require_input(path: &Path, what: &str, hint: Option<&str>) -> Result<(), IoError> {
    if path.exists() {
        return Ok(());
    }
    Err(IoError::MissingInput {
        what: what.to_string(),
        path: path.to_path_buf(),
        hint: hint.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::require_input;
    use crate::IoError;

    #[test]
    fn present_file_passes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training_data.csv");
        std::fs::write(&path, "x").unwrap();
        assert!(require_input(&path, "training data", None).is_ok());
    }

    #[test]
    fn absent_file_names_artifact_and_hint() {
        let dir = TempDir::new().unwrap();
        let err = require_input(&dir.path().join("rf_model.bin"), "trained model", Some("run `agrimap train` first"))
            .unwrap_err();
        assert!(matches!(err, IoError::MissingInput { .. }));
        let msg = err.to_string();
        assert!(msg.starts_with("trained model not found"));
        assert!(msg.ends_with("(run `agrimap train` first)"));
    }
}
