//! Per-pixel NDVI feature rows.

use ndarray::{Array2, ErrorKind, ShapeError};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RasterError;
use crate::grid::Raster;

/// Denominator used for the per-pixel standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdMode {
    /// Divide by `n - 1`.
    #[default]
    Sample,
    /// Divide by `n`.
    Population,
}

/// Controls which bands feed the derived statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    derived_band_count: usize,
    std_mode: StdMode,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            derived_band_count: 3,
            std_mode: StdMode::Sample,
        }
    }
}

impl FeatureConfig {
    /// Use the first `derived_band_count` bands for mean, std and range.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::ZeroDerivedBands`] if the count is zero.
    pub fn new(derived_band_count: usize) -> Result<Self, RasterError> {
        if derived_band_count == 0 {
            return Err(RasterError::ZeroDerivedBands);
        }
        Ok(Self {
            derived_band_count,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_std_mode(mut self, std_mode: StdMode) -> Self {
        self.std_mode = std_mode;
        self
    }

    #[must_use]
    pub fn derived_band_count(&self) -> usize {
        self.derived_band_count
    }

    #[must_use]
    pub fn std_mode(&self) -> StdMode {
        self.std_mode
    }
}

/// Column names for a raster with `n_bands` bands.
#[must_use]
pub fn feature_names(n_bands: usize) -> Vec<String> {
    (1..=n_bands)
        .map(|b| format!("NDVI_Band_{b}"))
        .chain(["NDVI_Mean", "NDVI_Std", "NDVI_Range"].map(String::from))
        .collect()
}

/// One row per pixel in row-major order, top-left first.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    shape: (usize, usize),
}

/// Rows of a [`FeatureTable`] with no missing value, and where they came from.
#[derive(Debug, Clone)]
pub struct CompleteRows {
    pub rows: Vec<Vec<f64>>,
    /// Pixel index of each kept row.
    pub pixel_indices: Vec<usize>,
    /// Rows removed for containing NaN.
    pub n_dropped: usize,
}

impl FeatureTable {
    /// # Errors
    ///
    /// Returns [`RasterError::Shape`] when the row count is not `rows * cols`
    /// of `shape`.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>, shape: (usize, usize)) -> Result<Self, RasterError> {
        if rows.len() != shape.0 * shape.1 {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        Ok(Self { columns, rows, shape })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// (rows, cols) of the grid the table was flattened from.
    #[must_use]
    pub fn grid_shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Indices of rows holding at least one NaN.
    #[must_use]
    pub fn incomplete_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|v| v.is_nan()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Copy out the complete rows.
    #[must_use]
    pub fn drop_incomplete(&self) -> CompleteRows {
        let mut rows = Vec::with_capacity(self.rows.len());
        let mut pixel_indices = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if row.iter().all(|v| !v.is_nan()) {
                rows.push(row.clone());
                pixel_indices.push(i);
            }
        }
        let n_dropped = self.rows.len() - rows.len();
        CompleteRows {
            rows,
            pixel_indices,
            n_dropped,
        }
    }

    /// Replace every NaN with `value`, returning the indices of rows touched.
    pub fn fill_missing(&mut self, value: f64) -> Vec<usize> {
        let mut touched = Vec::new();
        for (i, row) in self.rows.iter_mut().enumerate() {
            let mut hit = false;
            for v in row.iter_mut().filter(|v| v.is_nan()) {
                *v = value;
                hit = true;
            }
            if hit {
                touched.push(i);
            }
        }
        touched
    }

    /// Fold per-row values back onto the grid; inverse of the flattening.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Shape`] when `values.len() != rows * cols`.
    pub fn reshape<T>(values: Vec<T>, rows: usize, cols: usize) -> Result<Array2<T>, RasterError> {
        Ok(Array2::from_shape_vec((rows, cols), values)?)
    }
}

/// Flatten a raster into feature rows.
///
/// Each row holds every band value followed by mean, standard deviation and
/// range of the first `derived_band_count` bands. Missing (NaN) band values
/// are left out of the statistics; a statistic is NaN only when too few
/// values remain for it (none, or one for the sample standard deviation).
///
/// # Errors
///
/// Returns [`RasterError::TooFewBands`] when the raster has fewer bands than
/// the derived statistics need, and [`RasterError::ZeroDerivedBands`] for a
/// deserialized configuration with no derived bands.
#[instrument(skip_all, fields(bands = raster.n_bands(), derived = config.derived_band_count))]
pub fn extract_features(raster: &Raster, config: &FeatureConfig) -> Result<FeatureTable, RasterError> {
    let n_bands = raster.n_bands();
    let k = config.derived_band_count;
    if k == 0 {
        return Err(RasterError::ZeroDerivedBands);
    }
    if n_bands < k {
        return Err(RasterError::TooFewBands {
            required: k,
            found: n_bands,
        });
    }
    let (rows, cols) = (raster.grid().rows, raster.grid().cols);
    let data = raster.data();
    let std_mode = config.std_mode;

    let table: Vec<Vec<f64>> = (0..rows * cols)
        .into_par_iter()
        .map(|pixel| {
            let (r, c) = (pixel / cols, pixel % cols);
            let mut row: Vec<f64> = (0..n_bands).map(|b| f64::from(data[[b, r, c]])).collect();
            let (mean, std, range) = summarize(&row[..k], std_mode);
            row.extend([mean, std, range]);
            row
        })
        .collect();

    let n_incomplete = table.iter().filter(|r| r.iter().any(|v| v.is_nan())).count();
    debug!(n_incomplete, "pixels with missing values");
    info!(n_rows = table.len(), n_columns = n_bands + 3, "features extracted");

    FeatureTable::new(feature_names(n_bands), table, (rows, cols))
}

fn summarize(values: &[f64], std_mode: StdMode) -> (f64, f64, f64) {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    let std = match std_mode {
        StdMode::Sample if present.len() > 1 => (ss / (n - 1.0)).sqrt(),
        // one configured band
        StdMode::Sample if values.len() == 1 => 0.0,
        StdMode::Sample => f64::NAN,
        StdMode::Population => (ss / n).sqrt(),
    };
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    (mean, std, max - min)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3};

    use super::{FeatureConfig, FeatureTable, StdMode, extract_features, feature_names};
    use crate::error::RasterError;
    use crate::grid::{Raster, RasterGrid};
    use crate::transform::GeoTransform;

    fn raster(data: Array3<f32>) -> Raster {
        let (_, rows, cols) = data.dim();
        Raster::new(data, RasterGrid::new(rows, cols, GeoTransform::default())).unwrap()
    }

    #[test]
    fn pixel_values_and_statistics() {
        let mut data = Array3::zeros((3, 1, 1));
        data[[0, 0, 0]] = 0.2;
        data[[1, 0, 0]] = 0.4;
        data[[2, 0, 0]] = 0.6;
        let table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(table.columns(), feature_names(3).as_slice());
        assert!((row[3] - 0.4).abs() < 1e-6);
        assert!((row[4] - 0.2).abs() < 1e-6);
        assert!((row[5] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn population_std_divides_by_n() {
        let data = Array3::from_shape_vec((2, 1, 1), vec![0.0, 1.0]).unwrap();
        let cfg = FeatureConfig::new(2).unwrap().with_std_mode(StdMode::Population);
        let table = extract_features(&raster(data), &cfg).unwrap();
        assert!((table.rows()[0][3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn extra_bands_are_features_but_not_statistics() {
        let data = Array3::from_shape_vec((4, 1, 1), vec![0.1, 0.1, 0.1, 0.9]).unwrap();
        let table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.len(), 7);
        assert!((row[3] - 0.9).abs() < 1e-6);
        assert!(row[6].abs() < 1e-6);
    }

    #[test]
    fn rows_are_pixel_major() {
        let data = Array3::from_shape_fn((3, 2, 3), |(_, r, c)| (r * 10 + c) as f32);
        let table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();
        let firsts: Vec<f64> = table.rows().iter().map(|r| r[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        let grid = FeatureTable::reshape(firsts, 2, 3).unwrap();
        assert_eq!(grid, Array2::from_shape_fn((2, 3), |(r, c)| (r * 10 + c) as f64));
    }

    #[test]
    fn missing_band_value_is_left_out_of_statistics() {
        let data = Array3::from_shape_vec((3, 1, 1), vec![0.8, f32::NAN, 0.8]).unwrap();
        let mut table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();
        let row = &table.rows()[0];
        assert!(row[1].is_nan());
        assert!((row[3] - 0.8).abs() < 1e-6);
        assert!(row[4].abs() < 1e-12);
        assert!(row[5].abs() < 1e-12);
        assert_eq!(table.incomplete_rows(), vec![0]);

        assert_eq!(table.fill_missing(0.0), vec![0]);
        let filled: Vec<f64> = table.rows()[0].iter().map(|v| (v * 1e6).round() / 1e6).collect();
        assert_eq!(filled, vec![0.8, 0.0, 0.8, 0.8, 0.0, 0.0]);
    }

    #[test]
    fn statistics_need_enough_present_values() {
        let mut data = Array3::from_elem((3, 1, 3), f32::NAN);
        data[[2, 0, 1]] = 0.4;
        data[[0, 0, 2]] = 0.2;
        data[[2, 0, 2]] = 0.6;
        let table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();

        assert!(table.rows()[0][3..].iter().all(|v| v.is_nan()));

        let lone = &table.rows()[1];
        assert!((lone[3] - 0.4).abs() < 1e-6);
        assert!(lone[4].is_nan());
        assert!(lone[5].abs() < 1e-12);

        let pair = &table.rows()[2];
        assert!((pair[3] - 0.4).abs() < 1e-6);
        assert!((pair[4] - 0.08_f64.sqrt()).abs() < 1e-6);
        assert!((pair[5] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn population_std_of_one_present_value_is_zero() {
        let data = Array3::from_shape_vec((2, 1, 1), vec![f32::NAN, 0.3]).unwrap();
        let cfg = FeatureConfig::new(2).unwrap().with_std_mode(StdMode::Population);
        let table = extract_features(&raster(data), &cfg).unwrap();
        assert_eq!(table.rows()[0][3], 0.0);
    }

    #[test]
    fn incomplete_rows_dropped_or_filled() {
        let mut data = Array3::from_elem((3, 1, 2), 0.5f32);
        data[[1, 0, 1]] = f32::NAN;
        let mut table = extract_features(&raster(data), &FeatureConfig::default()).unwrap();
        assert_eq!(table.incomplete_rows(), vec![1]);

        let complete = table.drop_incomplete();
        assert_eq!(complete.pixel_indices, vec![0]);
        assert_eq!(complete.n_dropped, 1);

        assert_eq!(table.fill_missing(0.0), vec![1]);
        assert!(table.rows()[1].iter().all(|v| !v.is_nan()));
        assert!(table.incomplete_rows().is_empty());
    }

    #[test]
    fn too_few_bands() {
        let data = Array3::zeros((2, 1, 1));
        let err = extract_features(&raster(data), &FeatureConfig::default()).unwrap_err();
        assert!(matches!(err, RasterError::TooFewBands { required: 3, found: 2 }));
    }

    #[test]
    fn zero_derived_bands_rejected() {
        assert!(matches!(FeatureConfig::new(0), Err(RasterError::ZeroDerivedBands)));
    }

    #[test]
    fn reshape_rejects_wrong_length() {
        assert!(FeatureTable::reshape(vec![1u8; 5], 2, 3).is_err());
    }
}
