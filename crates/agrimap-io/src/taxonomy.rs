//! Crop class names and display colours.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::IoError;

/// One crop class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: u8,
    pub name: String,
    /// Hex colour such as `#1b9e77`.
    pub color: String,
}

/// Ordered class list loaded from JSON or built in.
///
/// ```json
/// { "classes": [ { "id": 1, "name": "Paddy (Rice)", "color": "#1b9e77" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTaxonomy {
    classes: Vec<ClassEntry>,
}

impl Default for ClassTaxonomy {
    /// The four classes of the Tumkur kharif study.
    fn default() -> Self {
        let entry = |id, name: &str, color: &str| ClassEntry {
            id,
            name: name.to_string(),
            color: color.to_string(),
        };
        Self {
            classes: vec![
                entry(1, "Paddy (Rice)", "#1b9e77"),
                entry(2, "Ragi (Finger Millet)", "#d95f02"),
                entry(3, "Groundnut / Maize", "#7570b3"),
                entry(4, "Fallow / Barren Land", "#e7298a"),
            ],
        }
    }
}

impl ClassTaxonomy {
    /// # Errors
    ///
    /// Returns [`IoError::InvalidTaxonomy`] for an empty list, id 0 or a repeated id.
    pub fn new(classes: Vec<ClassEntry>) -> Result<Self, IoError> {
        let taxonomy = Self { classes };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// # Errors
    ///
    /// [`IoError::OpenFile`], [`IoError::ParseTaxonomy`] or [`IoError::InvalidTaxonomy`].
    #[instrument(fields(path = %path.display()))]
    pub fn from_json_file(path: &Path) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path).map_err(|source| IoError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let taxonomy: Self = serde_json::from_str(&text).map_err(|source| IoError::ParseTaxonomy {
            path: path.to_path_buf(),
            source,
        })?;
        taxonomy.validate()?;
        debug!(n_classes = taxonomy.classes.len(), "taxonomy loaded");
        Ok(taxonomy)
    }

    fn validate(&self) -> Result<(), IoError> {
        if self.classes.is_empty() {
            return Err(IoError::InvalidTaxonomy {
                reason: "no classes".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for c in &self.classes {
            if c.id == 0 {
                return Err(IoError::InvalidTaxonomy {
                    reason: format!("\"{}\" uses id 0, which is reserved for background", c.name),
                });
            }
            if !seen.insert(c.id) {
                return Err(IoError::InvalidTaxonomy {
                    reason: format!("id {} appears more than once", c.id),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn entries(&self) -> &[ClassEntry] {
        &self.classes
    }

    #[must_use]
    pub fn ids(&self) -> Vec<u8> {
        self.classes.iter().map(|c| c.id).collect()
    }

    /// Display name; unknown ids read as `Class {id}`.
    #[must_use]
    pub fn name(&self, id: u8) -> Cow<'_, str> {
        match self.classes.iter().find(|c| c.id == id) {
            Some(c) => Cow::Borrowed(c.name.as_str()),
            None => Cow::Owned(format!("Class {id}")),
        }
    }

    #[must_use]
    pub fn color(&self, id: u8) -> Option<&str> {
        self.classes.iter().find(|c| c.id == id).map(|c| c.color.as_str())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{ClassEntry, ClassTaxonomy};
    use crate::IoError;

    #[test]
    fn default_names_and_fallback() {
        let t = ClassTaxonomy::default();
        assert_eq!(t.ids(), vec![1, 2, 3, 4]);
        assert_eq!(t.name(2), "Ragi (Finger Millet)");
        assert_eq!(t.name(9), "Class 9");
        assert_eq!(t.color(4), Some("#e7298a"));
        assert_eq!(t.color(9), None);
    }

    #[test]
    fn loads_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classes.json");
        std::fs::write(
            &path,
            r##"{"classes":[{"id":7,"name":"Sugarcane","color":"#66a61e"}]}"##,
        )
        .unwrap();
        let t = ClassTaxonomy::from_json_file(&path).unwrap();
        assert_eq!(t.name(7), "Sugarcane");
        assert_eq!(t.name(1), "Class 1");
    }

    #[test]
    fn background_id_rejected() {
        let entry = ClassEntry {
            id: 0,
            name: "Nothing".into(),
            color: "#000000".into(),
        };
        assert!(matches!(ClassTaxonomy::new(vec![entry]), Err(IoError::InvalidTaxonomy { .. })));
    }

    #[test]
    fn duplicate_id_rejected() {
        let entry = ClassEntry {
            id: 3,
            name: "x".into(),
            color: "#000000".into(),
        };
        assert!(ClassTaxonomy::new(vec![entry.clone(), entry]).is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classes.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(ClassTaxonomy::from_json_file(&path), Err(IoError::ParseTaxonomy { .. })));
    }
}
