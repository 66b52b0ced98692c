mod common;

use std::sync::Arc;

use augmix::augment::{Normalize, Preprocess};
use augmix::data::npy::{write_npy, NpyArray, NpyData};
use augmix::AugMixError;
use augmix::eval::{flip_prob, test, test_c, test_c_with, test_p_with, EvalSettings, CORRUPTIONS};
use augmix::network::{Model, ModelConfig, ModelRegistry};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn model() -> Box<dyn Model> {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let config = ModelConfig { input_dim: 3 * common::SIDE * common::SIDE, num_classes: 3, hidden_size: 8 };
    ModelRegistry::with_defaults().build("mlp", &config, &mut rng).unwrap()
}

fn settings(num_workers: usize) -> EvalSettings {
    let preprocess: Arc<dyn Preprocess> = Arc::new(Normalize::default());
    EvalSettings::new(4, num_workers, preprocess)
}

#[test]
fn test_corruption_mean_is_order_independent() {
    let dir = tempfile::tempdir().unwrap();
    let count = 6;
    for (i, name) in CORRUPTIONS.iter().enumerate() {
        common::write_images(&dir.path().join(format!("{}.npy", name)), count, 100 + i as u64);
    }
    common::write_labels(&dir.path().join("labels.npy"), &[0, 1, 2, 0, 1, 2]);

    let model = model();
    let test_data = common::toy_dataset(count, 3, 1);
    let settings = settings(2);
    let clean_before = test(model.as_ref(), &settings.loader(test_data.clone())).unwrap();

    let forward = test_c(model.as_ref(), &test_data, dir.path(), &settings).unwrap();
    let mut reversed: Vec<&str> = CORRUPTIONS.to_vec();
    reversed.reverse();
    let backward = test_c_with(model.as_ref(), &test_data, dir.path(), &reversed, &settings).unwrap();

    assert!((forward - backward).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&forward));

    // The evaluation dataset still holds the clean images.
    let clean_after = test(model.as_ref(), &settings.loader(test_data)).unwrap();
    assert_eq!(clean_before, clean_after);
}

#[test]
fn test_missing_corruption_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    common::write_labels(&dir.path().join("labels.npy"), &[0, 1]);
    let model = model();
    let result = test_c(model.as_ref(), &common::toy_dataset(2, 3, 1), dir.path(), &settings(0));
    assert!(result.is_err());
}

#[test]
fn test_perturbation_flip_rate_in_range() {
    let dir = tempfile::tempdir().unwrap();
    common::write_clips(&dir.path().join("gaussian_noise.npy"), 3, 4, 7);
    common::write_clips(&dir.path().join("rotate.npy"), 3, 4, 8);

    let model = model();
    let rate = test_p_with(model.as_ref(), dir.path(), &["gaussian_noise", "rotate"], 2).unwrap();
    assert!((0.0..=1.0).contains(&rate));

    // Batch size does not change the predictions.
    let again = test_p_with(model.as_ref(), dir.path(), &["gaussian_noise", "rotate"], 5).unwrap();
    assert_eq!(rate, again);
}

#[test]
fn test_flip_probability_extremes() {
    let stable = vec![vec![1, 1, 1], vec![2, 2, 2, 2, 2]];
    assert_eq!(flip_prob(&stable, false), 0.0);

    let changing = vec![vec![0, 1, 2, 0, 1]];
    assert_eq!(flip_prob(&changing, false), 1.0);

    // Every frame differs from the first.
    let drifting = vec![vec![0, 1, 1, 2]];
    assert_eq!(flip_prob(&drifting, true), 1.0);
}

#[test]
fn test_corruption_labels_outside_model_classes_rejected() {
    let model = model();
    let test_data = common::toy_dataset(2, 3, 1);
    for labels in [[3, 0], [0, 7]] {
        let dir = tempfile::tempdir().unwrap();
        common::write_images(&dir.path().join("fog.npy"), 2, 9);
        common::write_labels(&dir.path().join("labels.npy"), &labels);
        let err = test_c_with(model.as_ref(), &test_data, dir.path(), &["fog"], &settings(0)).unwrap_err();
        assert!(matches!(err, AugMixError::Array { .. }), "{:?}", labels);
    }
}

#[test]
fn test_corruption_images_of_other_size_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let small = NpyArray { shape: vec![2, 4, 4, 3], data: NpyData::U8(vec![128; 2 * 4 * 4 * 3]) };
    write_npy(dir.path().join("fog.npy"), &small).unwrap();
    common::write_labels(&dir.path().join("labels.npy"), &[0, 1]);

    let model = model();
    let err = test_c_with(model.as_ref(), &common::toy_dataset(2, 3, 1), dir.path(), &["fog"], &settings(0))
        .unwrap_err();
    assert!(matches!(err, AugMixError::Array { .. }));
}

#[test]
fn test_perturbation_frames_of_other_size_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let small = NpyArray { shape: vec![2, 3, 4, 4, 3], data: NpyData::U8(vec![64; 2 * 3 * 4 * 4 * 3]) };
    write_npy(dir.path().join("rotate.npy"), &small).unwrap();

    let model = model();
    let err = test_p_with(model.as_ref(), dir.path(), &["rotate"], 2).unwrap_err();
    assert!(matches!(err, AugMixError::Array { .. }));
}
