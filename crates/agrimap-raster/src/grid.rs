//! In-memory raster types.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::RasterError;
use crate::spatial_ref::SpatialRef;
use crate::transform::GeoTransform;

/// Size and georeferencing shared by every band of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub spatial_ref: SpatialRef,
    /// Sentinel read from `GDAL_NODATA`; such pixels are stored as NaN.
    pub nodata: Option<f64>,
}

impl RasterGrid {
    #[must_use]
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
            spatial_ref: SpatialRef::default(),
            nodata: None,
        }
    }

    #[must_use]
    pub fn with_spatial_ref(mut self, spatial_ref: SpatialRef) -> Self {
        self.spatial_ref = spatial_ref;
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn n_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// Same shape and same pixel-to-map transform.
    #[must_use]
    pub fn same_footprint(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.transform.approx_eq(&other.transform)
    }

    /// # Errors
    ///
    /// Returns [`RasterError::FootprintMismatch`] unless [`Self::same_footprint`] holds.
    pub fn require_same_footprint(&self, other: &Self) -> Result<(), RasterError> {
        if self.same_footprint(other) {
            Ok(())
        } else {
            Err(RasterError::FootprintMismatch {
                rows: self.rows,
                cols: self.cols,
                found_rows: other.rows,
                found_cols: other.cols,
            })
        }
    }
}

/// Multi-band float raster shaped (bands, rows, cols).
#[derive(Debug, Clone)]
pub struct Raster {
    data: Array3<f32>,
    grid: RasterGrid,
}

impl Raster {
    /// # Errors
    ///
    /// Returns [`RasterError::FootprintMismatch`] when the array's rows and
    /// columns disagree with the grid.
    pub fn new(data: Array3<f32>, grid: RasterGrid) -> Result<Self, RasterError> {
        let (_, rows, cols) = data.dim();
        if rows != grid.rows || cols != grid.cols {
            return Err(RasterError::FootprintMismatch {
                rows: grid.rows,
                cols: grid.cols,
                found_rows: rows,
                found_cols: cols,
            });
        }
        Ok(Self { data, grid })
    }

    #[must_use]
    pub fn n_bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    #[must_use]
    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    #[must_use]
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    #[must_use]
    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }
}

/// Single-band class map; 0 is background.
#[derive(Debug, Clone)]
pub struct ClassRaster {
    classes: Array2<u8>,
    grid: RasterGrid,
}

impl ClassRaster {
    /// # Errors
    ///
    /// Returns [`RasterError::FootprintMismatch`] when the array shape
    /// disagrees with the grid.
    pub fn new(classes: Array2<u8>, grid: RasterGrid) -> Result<Self, RasterError> {
        let (rows, cols) = classes.dim();
        if rows != grid.rows || cols != grid.cols {
            return Err(RasterError::FootprintMismatch {
                rows: grid.rows,
                cols: grid.cols,
                found_rows: rows,
                found_cols: cols,
            });
        }
        Ok(Self { classes, grid })
    }

    #[must_use]
    pub fn classes(&self) -> &Array2<u8> {
        &self.classes
    }

    #[must_use]
    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.classes.get((row, col)).copied()
    }

    /// Pixel count per non-zero class id.
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for &c in self.classes.iter().filter(|&&c| c != 0) {
            *counts.entry(c).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3, array};

    use super::{ClassRaster, Raster, RasterGrid};
    use crate::transform::GeoTransform;

    #[test]
    fn class_counts_skip_background() {
        let grid = RasterGrid::new(2, 3, GeoTransform::default());
        let cr = ClassRaster::new(array![[0, 1, 1], [4, 0, 1]], grid).unwrap();
        let counts = cr.class_counts();
        assert_eq!(counts.get(&1), Some(&3));
        assert_eq!(counts.get(&4), Some(&1));
        assert_eq!(counts.get(&0), None);
    }

    #[test]
    fn shape_must_match_grid() {
        let grid = RasterGrid::new(2, 2, GeoTransform::default());
        assert!(Raster::new(Array3::zeros((3, 2, 3)), grid.clone()).is_err());
        assert!(ClassRaster::new(Array2::zeros((3, 2)), grid).is_err());
    }

    #[test]
    fn footprint_compares_transform() {
        let a = RasterGrid::new(10, 10, GeoTransform::north_up(77.0, 13.5, 0.001, 0.001));
        let b = RasterGrid::new(10, 10, GeoTransform::north_up(77.1, 13.5, 0.001, 0.001));
        assert!(a.same_footprint(&a.clone()));
        assert!(!a.same_footprint(&b));
        assert!(a.require_same_footprint(&b).is_err());
    }
}
