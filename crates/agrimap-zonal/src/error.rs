//! Error types for agrimap-zonal.

use std::path::PathBuf;

/// Errors from boundary loading and zonal tallies.
#[derive(Debug, thiserror::Error)]
pub enum ZonalError {
    /// Returned when a boundary file cannot be read.
    #[error("cannot read boundaries {path}")]
    Io {
        /// Boundary file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a boundary file is not valid GeoJSON.
    #[error("invalid GeoJSON in {path}")]
    ParseGeoJson {
        /// Boundary file.
        path: PathBuf,
        /// Underlying GeoJSON error.
        source: geojson::Error,
    },

    /// Returned when the GeoJSON root is a bare geometry.
    #[error("{path} holds a bare geometry, expected a Feature or FeatureCollection")]
    NotFeatures {
        /// Boundary file.
        path: PathBuf,
    },

    /// Returned when a feature lacks the configured name property.
    #[error("{path}: feature {feature_index} has no \"{property}\" property")]
    MissingNameProperty {
        /// Boundary file.
        path: PathBuf,
        /// Zero-based feature index.
        feature_index: usize,
        /// Property that was looked up.
        property: String,
    },

    /// Returned when a feature geometry cannot be converted.
    #[error("{path}: feature {feature_index} has an invalid geometry")]
    InvalidGeometry {
        /// Boundary file.
        path: PathBuf,
        /// Zero-based feature index.
        feature_index: usize,
        /// Underlying GeoJSON error.
        source: geojson::Error,
    },

    /// Returned when the class raster's transform cannot be inverted.
    #[error("class raster transform is singular")]
    SingularTransform,
}
