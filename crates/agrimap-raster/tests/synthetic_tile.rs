//! A 100x100 three-band NDVI tile through write, read, features and labels.

use ndarray::Array3;
use tempfile::TempDir;

use agrimap_raster::{
    FeatureConfig, FeatureTable, GeoTransform, LabelSource, RandomLabels, Raster, RasterGrid, SpatialRef,
    build_training_rows, extract_features, feature_names, read_raster, write_raster,
};

fn tile() -> Raster {
    let data = Array3::from_shape_fn((3, 100, 100), |(b, r, c)| {
        ((r * 100 + c + b * 37) % 100) as f32 / 100.0
    });
    let grid = RasterGrid::new(100, 100, GeoTransform::north_up(77.0, 13.5, 0.001, 0.001))
        .with_spatial_ref(SpatialRef::from_epsg(4326));
    Raster::new(data, grid).unwrap()
}

#[test]
fn tile_yields_ten_thousand_rows_of_six_features() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ndvi_data.tif");
    write_raster(&path, &tile()).unwrap();

    let raster = read_raster(&path).unwrap();
    let table = extract_features(&raster, &FeatureConfig::default()).unwrap();
    assert_eq!(table.n_rows(), 10_000);
    assert_eq!(
        table.columns(),
        ["NDVI_Band_1", "NDVI_Band_2", "NDVI_Band_3", "NDVI_Mean", "NDVI_Std", "NDVI_Range"]
    );
    assert!(table.incomplete_rows().is_empty());
}

#[test]
fn range_is_never_negative_on_complete_rows() {
    let mut data = Array3::from_shape_fn((4, 100, 100), |(b, r, c)| {
        ((r * 131 + c * 71 + b * 29) % 200) as f32 / 100.0 - 1.0
    });
    for i in 0..100 {
        data[[i % 3, i, (i * 7) % 100]] = f32::NAN;
    }
    let grid = RasterGrid::new(100, 100, GeoTransform::north_up(77.0, 13.5, 0.001, 0.001));
    let raster = Raster::new(data, grid).unwrap();

    let names = feature_names(4);
    let range = names.iter().position(|n| n == "NDVI_Range").unwrap();
    let table = extract_features(&raster, &FeatureConfig::default()).unwrap();
    let complete = table.drop_incomplete();
    assert_eq!(complete.n_dropped, 100);
    assert!(complete.rows.iter().any(|row| row[0] < 0.0));
    for row in &complete.rows {
        assert!(row[range] >= 0.0, "negative range in {row:?}");
    }
}

#[test]
fn flatten_then_reshape_restores_bands() {
    let raster = tile();
    let table = extract_features(&raster, &FeatureConfig::default()).unwrap();
    for b in 0..3 {
        let column: Vec<f32> = table.rows().iter().map(|row| row[b] as f32).collect();
        let back = FeatureTable::reshape(column, 100, 100).unwrap();
        assert_eq!(back, raster.band(b));
    }
}

#[test]
fn random_labels_make_a_complete_training_set() {
    let raster = tile();
    let table = extract_features(&raster, &FeatureConfig::default()).unwrap();
    let labels = RandomLabels::new(vec![1, 2, 3, 4], 42).unwrap().assign(raster.grid()).unwrap();
    let training = build_training_rows(&table, &labels).unwrap();
    assert_eq!(training.rows.len(), 10_000);
    assert_eq!(training.n_unlabeled, 0);
    assert_eq!(training.class_distribution().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}
