//! Per-region class tallies and areas.

use std::collections::BTreeMap;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument, warn};

use agrimap_io::{ClassTaxonomy, ZonalRecord};
use agrimap_raster::ClassRaster;

use crate::error::ZonalError;
use crate::mask::region_mask;
use crate::regions::Region;

/// Pixel count per non-zero class over the whole raster.
#[must_use]
pub fn whole_raster_tally(classes: &ClassRaster) -> BTreeMap<u8, usize> {
    classes.class_counts()
}

/// Pixel count per non-zero class inside `region`; `None` when it has no
/// usable geometry.
#[must_use]
pub fn region_tally(classes: &ClassRaster, region: &Region) -> Option<BTreeMap<u8, usize>> {
    let geometry = region.geometry.as_ref().filter(|g| !g.0.is_empty())?;
    let mut counts = BTreeMap::new();
    for (row, col) in region_mask(geometry, classes.grid()) {
        match classes.get(row, col) {
            Some(0) | None => {}
            Some(c) => *counts.entry(c).or_insert(0) += 1,
        }
    }
    Some(counts)
}

/// One record per (region, class) with at least one pixel.
///
/// Regions are processed in parallel and records come back in region order,
/// classes ascending within a region. `Area_ha` is the pixel count times the
/// pixel area over 10 000, so map units are taken as metres. `Percentage` is
/// relative to the region's non-background pixels. Regions with null or empty
/// geometry are skipped with a warning; regions outside the raster produce no
/// records.
///
/// # Errors
///
/// Returns [`ZonalError::SingularTransform`] when the raster transform cannot
/// be inverted.
#[instrument(skip_all, fields(n_regions = regions.len()))]
pub fn zonal_statistics(
    classes: &ClassRaster,
    regions: &[Region],
    taxonomy: &ClassTaxonomy,
) -> Result<Vec<ZonalRecord>, ZonalError> {
    let transform = classes.grid().transform;
    if transform.inverse().is_none() {
        return Err(ZonalError::SingularTransform);
    }
    let pixel_area_ha = transform.pixel_area_ha();

    let per_region: Vec<Vec<ZonalRecord>> = regions
        .par_iter()
        .map(|region| {
            let Some(counts) = region_tally(classes, region) else {
                warn!(region = %region.name, "no usable geometry, skipped");
                return Vec::new();
            };
            let total: usize = counts.values().sum();
            if total == 0 {
                debug!(region = %region.name, "no classified pixels inside");
            }
            counts
                .into_iter()
                .map(|(class_id, pixel_count)| ZonalRecord {
                    region_type: region.region_type.clone(),
                    region_name: region.name.clone(),
                    class_id,
                    crop_type: taxonomy.name(class_id).into_owned(),
                    area_ha: pixel_count as f64 * pixel_area_ha,
                    pixel_count,
                    percentage: pixel_count as f64 / total as f64 * 100.0,
                })
                .collect()
        })
        .collect();

    let records: Vec<ZonalRecord> = per_region.into_iter().flatten().collect();
    info!(n_records = records.len(), pixel_area_ha, "zonal statistics computed");
    Ok(records)
}
