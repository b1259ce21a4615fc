//! Criterion benchmarks for training on and classifying a 100x100 NDVI tile.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use agrimap_rf::{CrossValidation, RandomForestConfig};

/// Pixel rows shaped like the extracted feature table: three bands then
/// mean, sample std and range.
fn ndvi_tile(n_pixels: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_pixels);
    let mut labels = Vec::with_capacity(n_pixels);
    for _ in 0..n_pixels {
        let class = rng.gen_range(1..=4usize);
        let centre = 0.15 + 0.18 * class as f64;
        let bands: Vec<f64> = (0..3).map(|_| centre + rng.gen_range(-0.1..0.1)).collect();
        let mean = bands.iter().sum::<f64>() / 3.0;
        let var = bands.iter().map(|b| (b - mean).powi(2)).sum::<f64>() / 2.0;
        let max = bands.iter().copied().fold(f64::MIN, f64::max);
        let min = bands.iter().copied().fold(f64::MAX, f64::min);
        let mut row = bands;
        row.extend([mean, var.sqrt(), max - min]);
        features.push(row);
        labels.push(class);
    }
    let names = ["NDVI_Band_1", "NDVI_Band_2", "NDVI_Band_3", "NDVI_Mean", "NDVI_Std", "NDVI_Range"]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    (features, labels, names)
}

fn bench_train(c: &mut Criterion) {
    let (features, labels, names) = ndvi_tile(8_000, 42);
    let cfg = RandomForestConfig::new(100).unwrap();
    c.bench_function("train_8000px_100trees", |b| {
        b.iter(|| cfg.fit(&features, &labels, &names).unwrap());
    });
}

fn bench_predict(c: &mut Criterion) {
    let (features, labels, names) = ndvi_tile(10_000, 42);
    let forest = RandomForestConfig::new(100)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into_forest();
    c.bench_function("predict_10000px_100trees", |b| {
        b.iter(|| forest.predict_batch(&features).unwrap());
    });
}

fn bench_cross_validation(c: &mut Criterion) {
    let (features, labels, names) = ndvi_tile(2_000, 7);
    let cfg = RandomForestConfig::new(20).unwrap();
    let cv = CrossValidation::new(5).unwrap();
    c.bench_function("cv5_2000px_20trees", |b| {
        b.iter(|| cv.evaluate(&cfg, &features, &labels, &names).unwrap());
    });
}

criterion_group!(benches, bench_train, bench_predict, bench_cross_validation);
criterion_main!(benches);
