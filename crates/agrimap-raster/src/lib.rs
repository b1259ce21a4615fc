//! Raster side of the crop mapping pipeline.
//!
//! GeoTIFF rasters in and out, the affine pixel/map transform, per-pixel NDVI
//! feature rows and the label sources that turn them into training data.

mod error;
mod features;
mod geotiff;
mod grid;
mod labels;
mod spatial_ref;
mod transform;

pub use error::RasterError;
pub use features::{CompleteRows, FeatureConfig, FeatureTable, StdMode, extract_features, feature_names};
pub use geotiff::{read_class_raster, read_raster, write_class_raster, write_raster};
pub use grid::{ClassRaster, Raster, RasterGrid};
pub use labels::{LabelRaster, LabelSource, LabeledTable, RandomLabels, build_training_rows};
pub use spatial_ref::SpatialRef;
pub use transform::{GeoTransform, InverseTransform};
