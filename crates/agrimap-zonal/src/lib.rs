//! Crop area by administrative region.
//!
//! Boundaries come from GeoJSON in the classified raster's CRS. A pixel
//! belongs to a region when its centre lies inside the region's polygon.

mod error;
mod mask;
mod regions;
mod stats;

pub use error::ZonalError;
pub use mask::region_mask;
pub use regions::{Region, read_regions};
pub use stats::{region_tally, whole_raster_tally, zonal_statistics};
