#![allow(dead_code)]

use std::path::Path;

use augmix::data::array::{ArrayDataset, ImageArray};
use augmix::data::npy::{write_npy, NpyArray, NpyData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const SIDE: usize = 8;

/// `count` random `SIDE`×`SIDE` images, as raw HWC bytes.
pub fn random_pixels(count: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count * SIDE * SIDE * 3).map(|_| rng.gen()).collect()
}

/// A dataset of `count` random images with labels cycling through
/// `num_classes`.
pub fn toy_dataset(count: usize, num_classes: usize, seed: u64) -> ArrayDataset {
    let images = ImageArray::new(count, SIDE, SIDE, random_pixels(count, seed)).unwrap();
    let labels = (0..count).map(|i| i % num_classes).collect();
    ArrayDataset::new(images, labels).unwrap()
}

pub fn write_images(path: &Path, count: usize, seed: u64) {
    let array = NpyArray { shape: vec![count, SIDE, SIDE, 3], data: NpyData::U8(random_pixels(count, seed)) };
    write_npy(path, &array).unwrap();
}

pub fn write_labels(path: &Path, labels: &[usize]) {
    let data = NpyData::I64(labels.iter().map(|&l| l as i64).collect());
    write_npy(path, &NpyArray { shape: vec![labels.len()], data }).unwrap();
}

pub fn write_clips(path: &Path, clips: usize, frames: usize, seed: u64) {
    let array = NpyArray {
        shape: vec![clips, frames, SIDE, SIDE, 3],
        data: NpyData::U8(random_pixels(clips * frames, seed)),
    };
    write_npy(path, &array).unwrap();
}
