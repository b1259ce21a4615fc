//! Training labels for feature rows.

use std::collections::BTreeMap;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::error::RasterError;
use crate::features::FeatureTable;
use crate::geotiff::read_class_raster;
use crate::grid::{ClassRaster, RasterGrid};

/// Produces one label per pixel of a grid, pixel-major; values `<= 0` mean unlabeled.
pub trait LabelSource {
    /// # Errors
    ///
    /// Implementation specific; see each source.
    fn assign(&self, grid: &RasterGrid) -> Result<Vec<i32>, RasterError>;

    /// Short name for logs and reports.
    fn describe(&self) -> &'static str;
}

/// Uniformly random placeholder labels drawn from a fixed id set.
///
/// Useful only to exercise the pipeline; the resulting model has no skill.
#[derive(Debug, Clone)]
pub struct RandomLabels {
    class_ids: Vec<i32>,
    seed: u64,
}

impl RandomLabels {
    /// # Errors
    ///
    /// Returns [`RasterError::NoClassIds`] for an empty id set.
    pub fn new(class_ids: Vec<i32>, seed: u64) -> Result<Self, RasterError> {
        if class_ids.is_empty() {
            return Err(RasterError::NoClassIds);
        }
        Ok(Self { class_ids, seed })
    }
}

impl LabelSource for RandomLabels {
    fn assign(&self, grid: &RasterGrid) -> Result<Vec<i32>, RasterError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok((0..grid.n_pixels())
            .map(|_| self.class_ids[rng.gen_range(0..self.class_ids.len())])
            .collect())
    }

    fn describe(&self) -> &'static str {
        "random"
    }
}

/// Ground truth from a co-registered single-band class raster; 0 is unlabeled.
#[derive(Debug, Clone)]
pub struct LabelRaster {
    classes: ClassRaster,
}

impl LabelRaster {
    #[must_use]
    pub fn new(classes: ClassRaster) -> Self {
        Self { classes }
    }

    /// # Errors
    ///
    /// Anything [`read_class_raster`] returns.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        read_class_raster(path).map(Self::new)
    }
}

impl LabelSource for LabelRaster {
    /// # Errors
    ///
    /// Returns [`RasterError::FootprintMismatch`] unless the label raster and
    /// `grid` share shape and transform.
    fn assign(&self, grid: &RasterGrid) -> Result<Vec<i32>, RasterError> {
        grid.require_same_footprint(self.classes.grid())?;
        Ok(self.classes.classes().iter().map(|&c| i32::from(c)).collect())
    }

    fn describe(&self) -> &'static str {
        "label_raster"
    }
}

/// Feature rows paired with positive class labels.
#[derive(Debug, Clone)]
pub struct LabeledTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Rows skipped because their label was `<= 0`.
    pub n_unlabeled: usize,
    /// Labeled rows skipped because a feature was NaN.
    pub n_incomplete: usize,
}

impl LabeledTable {
    /// Row count per class id.
    #[must_use]
    pub fn class_distribution(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &l in &self.labels {
            *counts.entry(l).or_insert(0) += 1;
        }
        counts
    }
}

/// Attach labels to feature rows, keeping only labeled, complete rows.
///
/// # Errors
///
/// Returns [`RasterError::LabelCountMismatch`] when the lengths differ.
#[instrument(skip_all, fields(n_rows = table.n_rows()))]
pub fn build_training_rows(table: &FeatureTable, labels: &[i32]) -> Result<LabeledTable, RasterError> {
    if labels.len() != table.n_rows() {
        return Err(RasterError::LabelCountMismatch {
            n_rows: table.n_rows(),
            n_labels: labels.len(),
        });
    }
    let mut out = LabeledTable {
        columns: table.columns().to_vec(),
        rows: Vec::new(),
        labels: Vec::new(),
        n_unlabeled: 0,
        n_incomplete: 0,
    };
    for (row, &label) in table.rows().iter().zip(labels) {
        let Ok(class) = usize::try_from(label) else {
            out.n_unlabeled += 1;
            continue;
        };
        if class == 0 {
            out.n_unlabeled += 1;
        } else if row.iter().any(|v| v.is_nan()) {
            out.n_incomplete += 1;
        } else {
            out.rows.push(row.clone());
            out.labels.push(class);
        }
    }
    info!(
        n_kept = out.rows.len(),
        n_unlabeled = out.n_unlabeled,
        n_incomplete = out.n_incomplete,
        "training rows built"
    );
    Ok(out)
}
