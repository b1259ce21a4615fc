//! Administrative boundaries from GeoJSON.

use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::{GeoJson, JsonValue};
use tracing::{info, instrument, warn};

use crate::error::ZonalError;

/// A named boundary; `geometry` is `None` when the feature had null geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Level label such as `District` or `Taluk`.
    pub region_type: String,
    pub name: String,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl Region {
    #[must_use]
    pub fn new(region_type: &str, name: &str, geometry: Option<MultiPolygon<f64>>) -> Self {
        Self {
            region_type: region_type.to_string(),
            name: name.to_string(),
            geometry,
        }
    }
}

/// Load every feature of a GeoJSON file as a [`Region`], in file order.
///
/// Coordinates must already be in the classified raster's CRS. Point and line
/// geometries carry no area and load as empty multipolygons.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ZonalError::Io`] | file cannot be read |
/// | [`ZonalError::ParseGeoJson`] | not GeoJSON |
/// | [`ZonalError::NotFeatures`] | root is a bare geometry |
/// | [`ZonalError::MissingNameProperty`] | a feature lacks `name_property` |
/// | [`ZonalError::InvalidGeometry`] | a geometry cannot be converted |
#[instrument(fields(path = %path.display()))]
pub fn read_regions(path: &Path, name_property: &str, region_type: &str) -> Result<Vec<Region>, ZonalError> {
    let text = std::fs::read_to_string(path).map_err(|source| ZonalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let features = match text.parse::<GeoJson>().map_err(|source| ZonalError::ParseGeoJson {
        path: path.to_path_buf(),
        source,
    })? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(ZonalError::NotFeatures {
                path: path.to_path_buf(),
            });
        }
    };

    let mut regions = Vec::with_capacity(features.len());
    for (feature_index, feature) in features.into_iter().enumerate() {
        let name = match feature.property(name_property) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => {
                return Err(ZonalError::MissingNameProperty {
                    path: path.to_path_buf(),
                    feature_index,
                    property: name_property.to_string(),
                });
            }
            Some(other) => other.to_string(),
        };
        let geometry = match feature.geometry {
            Some(g) => {
                let g = Geometry::<f64>::try_from(g).map_err(|source| ZonalError::InvalidGeometry {
                    path: path.to_path_buf(),
                    feature_index,
                    source,
                })?;
                let areal = to_multipolygon(g);
                if areal.0.is_empty() {
                    warn!(region = %name, "geometry has no polygons");
                }
                Some(areal)
            }
            None => None,
        };
        regions.push(Region {
            region_type: region_type.to_string(),
            name,
            geometry,
        });
    }
    info!(n_regions = regions.len(), region_type, "boundaries loaded");
    Ok(regions)
}

fn to_multipolygon(geometry: Geometry<f64>) -> MultiPolygon<f64> {
    match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
        Geometry::GeometryCollection(gc) => {
            MultiPolygon::new(gc.into_iter().flat_map(|g| to_multipolygon(g).0).collect())
        }
        _ => MultiPolygon::new(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::read_regions;
    use crate::error::ZonalError;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("districts.geojson");
        std::fs::write(&path, body).unwrap();
        path
    }

    const TWO_DISTRICTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"DISTRICT": "Tumkur"},
             "geometry": {"type": "Polygon", "coordinates": [[[77.0,13.4],[77.1,13.4],[77.1,13.5],[77.0,13.5],[77.0,13.4]]]}},
            {"type": "Feature", "properties": {"DISTRICT": "Nowhere"}, "geometry": null},
            {"type": "Feature", "properties": {"DISTRICT": 42},
             "geometry": {"type": "Point", "coordinates": [77.0, 13.4]}}
        ]
    }"#;

    #[test]
    fn features_load_in_order() {
        let dir = TempDir::new().unwrap();
        let regions = read_regions(&write(&dir, TWO_DISTRICTS), "DISTRICT", "District").unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].name, "Tumkur");
        assert_eq!(regions[0].region_type, "District");
        assert_eq!(regions[0].geometry.as_ref().map(|g| g.0.len()), Some(1));
        assert!(regions[1].geometry.is_none());
        assert_eq!(regions[2].name, "42");
        assert_eq!(regions[2].geometry.as_ref().map(|g| g.0.len()), Some(0));
    }

    #[test]
    fn missing_name_is_error() {
        let dir = TempDir::new().unwrap();
        let err = read_regions(&write(&dir, TWO_DISTRICTS), "TALUK", "Taluk").unwrap_err();
        assert!(matches!(err, ZonalError::MissingNameProperty { feature_index: 0, .. }));
    }

    #[test]
    fn bare_geometry_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#);
        assert!(matches!(read_regions(&path, "n", "District"), Err(ZonalError::NotFeatures { .. })));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "{not json");
        assert!(matches!(read_regions(&path, "n", "District"), Err(ZonalError::ParseGeoJson { .. })));
    }
}
