//! Error types for agrimap-raster.

use std::path::PathBuf;

/// Errors from GeoTIFF I/O, feature extraction and label assignment.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Returned when a raster file cannot be opened or created.
    #[error("cannot access raster {path}")]
    Io {
        /// Raster path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the TIFF decoder rejects the file.
    #[error("failed to decode GeoTIFF {path}")]
    Decode {
        /// Raster path.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned when the TIFF encoder fails while writing.
    #[error("failed to encode GeoTIFF {path}")]
    Encode {
        /// Output path.
        path: PathBuf,
        /// Underlying TIFF error.
        source: tiff::TiffError,
    },

    /// Returned for sample formats other than 8 to 64 bit integers and 32/64 bit floats.
    #[error("unsupported sample format in {path}")]
    UnsupportedSampleType {
        /// Raster path.
        path: PathBuf,
    },

    /// Returned when a page of a multi-page file has a different size than the first.
    #[error("page {page} of {path} is {found_cols}x{found_rows}, expected {cols}x{rows}")]
    PageShapeMismatch {
        /// Raster path.
        path: PathBuf,
        /// Zero-based page index.
        page: usize,
        /// Width of the first page.
        cols: usize,
        /// Height of the first page.
        rows: usize,
        /// Width of the offending page.
        found_cols: usize,
        /// Height of the offending page.
        found_rows: usize,
    },

    /// Returned when a decoded buffer is not a whole number of bands.
    #[error("{path}: {len} samples do not tile a {cols}x{rows} grid")]
    RaggedBuffer {
        /// Raster path.
        path: PathBuf,
        /// Decoded sample count.
        len: usize,
        /// Grid width.
        cols: usize,
        /// Grid height.
        rows: usize,
    },

    /// Returned when a flat buffer cannot be shaped into the requested array.
    #[error("array shape error")]
    Shape {
        /// Underlying ndarray error.
        #[from]
        source: ndarray::ShapeError,
    },

    /// Returned when fewer bands exist than the derived statistics need.
    #[error("raster has {found} bands, derived statistics need at least {required}")]
    TooFewBands {
        /// Configured derived band count.
        required: usize,
        /// Bands present.
        found: usize,
    },

    /// Returned when the derived band count is configured as zero.
    #[error("derived band count must be at least 1")]
    ZeroDerivedBands,

    /// Returned when a class raster has more than one band.
    #[error("class raster {path} has {bands} bands, expected 1")]
    NotSingleBand {
        /// Raster path.
        path: PathBuf,
        /// Bands present.
        bands: usize,
    },

    /// Returned when a class raster holds a value outside `0..=255`.
    #[error("class raster {path} holds value {value}, outside 0..=255")]
    ClassOutOfRange {
        /// Raster path.
        path: PathBuf,
        /// The offending value.
        value: f64,
    },

    /// Returned when two rasters that must be co-registered are not.
    #[error("raster footprints differ: expected {rows}x{cols}, found {found_rows}x{found_cols} (or a different transform)")]
    FootprintMismatch {
        /// Rows of the reference grid.
        rows: usize,
        /// Columns of the reference grid.
        cols: usize,
        /// Rows of the other grid.
        found_rows: usize,
        /// Columns of the other grid.
        found_cols: usize,
    },

    /// Returned when label and feature row counts differ.
    #[error("{n_labels} labels supplied for {n_rows} feature rows")]
    LabelCountMismatch {
        /// Feature rows.
        n_rows: usize,
        /// Labels.
        n_labels: usize,
    },

    /// Returned when a random label source has no class ids to draw from.
    #[error("random labels need at least one class id")]
    NoClassIds,
}
