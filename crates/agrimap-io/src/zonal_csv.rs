//! Per-region crop area CSV.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::IoError;
use crate::table::ensure_parent;

const HEADER: [&str; 7] = [
    "Region_Type",
    "Region_Name",
    "Cluster_ID",
    "Crop_Type",
    "Area_ha",
    "Pixel_Count",
    "Percentage",
];

/// One (region, class) tally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonalRecord {
    #[serde(rename = "Region_Type")]
    pub region_type: String,
    #[serde(rename = "Region_Name")]
    pub region_name: String,
    #[serde(rename = "Cluster_ID")]
    pub class_id: u8,
    #[serde(rename = "Crop_Type")]
    pub crop_type: String,
    #[serde(rename = "Area_ha")]
    pub area_ha: f64,
    #[serde(rename = "Pixel_Count")]
    pub pixel_count: usize,
    /// Share of the region's non-background pixels, 0 to 100.
    #[serde(rename = "Percentage")]
    pub percentage: f64,
}

/// Write records in the given order; an empty slice still gets a header.
///
/// # Errors
///
/// [`IoError::OutputDirCreate`], [`IoError::CsvWrite`] or [`IoError::WriteFile`].
#[instrument(skip(records), fields(path = %path.display(), n_records = records.len()))]
pub fn write_zonal_csv(path: &Path, records: &[ZonalRecord]) -> Result<(), IoError> {
    ensure_parent(path)?;
    let csv_err = |source: csv::Error| IoError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    wtr.write_record(HEADER).map_err(csv_err)?;
    for record in records {
        wtr.serialize(record).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| IoError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;
    info!("zonal table written");
    Ok(())
}
