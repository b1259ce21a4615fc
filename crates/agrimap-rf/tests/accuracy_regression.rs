//! Accuracy regression on a deterministic NDVI-like dataset.
//!
//! Four crop classes occupy distinct NDVI bands with overlapping noise, so a
//! healthy forest scores well but not perfectly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use agrimap_rf::{CrossValidation, RandomForestConfig, TrainTestSplit, train_and_validate};

fn crop_pixels() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..400 {
        let class = 1 + i % 4;
        let centre = 0.1 + 0.2 * class as f64;
        let bands: Vec<f64> = (0..3).map(|_| centre + rng.gen_range(-0.08..0.08)).collect();
        let mean = bands.iter().sum::<f64>() / 3.0;
        let noise: f64 = rng.r#gen();
        features.push(vec![bands[0], bands[1], bands[2], mean, noise]);
        labels.push(class);
    }
    let names = ["NDVI_Band_1", "NDVI_Band_2", "NDVI_Band_3", "NDVI_Mean", "noise"]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    (features, labels, names)
}

fn run() -> agrimap_rf::TrainingOutcome {
    let (features, labels, names) = crop_pixels();
    train_and_validate(
        &RandomForestConfig::new(50).unwrap(),
        &TrainTestSplit::new(0.2).unwrap(),
        &CrossValidation::new(5).unwrap(),
        &features,
        &labels,
        &names,
    )
    .unwrap()
}

#[test]
fn holdout_sizes_follow_eighty_twenty() {
    let outcome = run();
    assert_eq!(outcome.n_train, 320);
    assert_eq!(outcome.n_test, 80);
    assert_eq!(outcome.test_confusion.total(), 80);
    assert_eq!(outcome.cross_validation.n_samples, 320);
}

#[test]
fn accuracies_above_threshold() {
    let outcome = run();
    assert!(outcome.cross_validation.mean_accuracy > 0.9, "cv {}", outcome.cross_validation.mean_accuracy);
    assert!(outcome.test_accuracy > 0.9, "test {}", outcome.test_accuracy);
    assert!(outcome.train_accuracy >= outcome.test_accuracy - 0.05);
}

#[test]
fn cv_statistics_are_consistent() {
    let cv = run().cross_validation;
    assert_eq!(cv.fold_accuracies.len(), 5);
    let mean = cv.fold_accuracies.iter().sum::<f64>() / 5.0;
    assert!((mean - cv.mean_accuracy).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&cv.mean_accuracy));
    assert!(cv.std_accuracy >= 0.0);
}

#[test]
fn noise_column_ranks_last() {
    let outcome = run();
    let total: f64 = outcome.importances.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(outcome.importances.last().map(|f| f.name.as_str()), Some("noise"));
}

#[test]
fn training_is_deterministic() {
    let a = run();
    let b = run();
    assert_eq!(a.test_accuracy, b.test_accuracy);
    assert_eq!(a.cross_validation.fold_accuracies, b.cross_validation.fold_accuracies);
    assert_eq!(a.forest.class_ids(), &[1, 2, 3, 4]);
}
