//! GeoTIFF coordinate reference metadata carried through unchanged.

use serde::{Deserialize, Serialize};

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// The GeoKey directory and its parameter tables as found in the source file.
///
/// The directory is not interpreted beyond reading the EPSG code; writers copy
/// it verbatim so outputs keep the CRS of their inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialRef {
    pub geo_keys: Vec<u16>,
    pub double_params: Vec<f64>,
    pub ascii_params: Option<String>,
}

impl SpatialRef {
    /// Minimal directory for an EPSG code. Codes 4000..5000 are treated as
    /// geographic, anything else as projected.
    #[must_use]
    pub fn from_epsg(code: u16) -> Self {
        let (model, key) = if (4000..5000).contains(&code) {
            (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
        } else {
            (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
        };
        Self {
            geo_keys: vec![
                1, 1, 0, 3,
                GT_MODEL_TYPE, 0, 1, model,
                GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
                key, 0, 1, code,
            ],
            double_params: Vec::new(),
            ascii_params: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geo_keys.is_empty()
    }

    /// Projected CRS code if present, otherwise the geographic one.
    #[must_use]
    pub fn epsg(&self) -> Option<u16> {
        self.key_value(PROJECTED_CS_TYPE)
            .or_else(|| self.key_value(GEOGRAPHIC_TYPE))
    }

    /// Inline value of a short GeoKey; keys stored in parameter tables yield `None`.
    fn key_value(&self, key: u16) -> Option<u16> {
        let n_keys = usize::from(*self.geo_keys.get(3)?);
        self.geo_keys
            .get(4..)?
            .chunks_exact(4)
            .take(n_keys)
            .find(|entry| entry[0] == key && entry[1] == 0)
            .map(|entry| entry[3])
            // 32767 is the GeoTIFF "user-defined" marker, not a registry code.
            .filter(|&code| code != 0 && code != 32767)
    }
}

#[cfg(test)]
mod tests {
    use super::SpatialRef;

    #[test]
    fn geographic_code_round_trips() {
        assert_eq!(SpatialRef::from_epsg(4326).epsg(), Some(4326));
    }

    #[test]
    fn projected_preferred_over_geographic() {
        let srs = SpatialRef {
            geo_keys: vec![1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, 32643],
            ..SpatialRef::default()
        };
        assert_eq!(srs.epsg(), Some(32643));
    }

    #[test]
    fn user_defined_and_missing_have_no_code() {
        assert_eq!(SpatialRef::default().epsg(), None);
        let srs = SpatialRef {
            geo_keys: vec![1, 1, 0, 1, 3072, 0, 1, 32767],
            ..SpatialRef::default()
        };
        assert_eq!(srs.epsg(), None);
    }
}
