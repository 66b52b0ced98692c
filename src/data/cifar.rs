//! CIFAR-10 / CIFAR-100 binary-format readers.
//!
//! CIFAR-10 records are `[label][R×1024][G×1024][B×1024]`; CIFAR-100 records
//! carry a coarse and a fine label byte before the pixels, and the fine label
//! is used. Pixel planes are converted to interleaved HWC.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::array::{ArrayDataset, ImageArray};
use crate::error::{AugMixError, Result};

pub const CIFAR_SIDE: usize = 32;
const PLANE: usize = CIFAR_SIDE * CIFAR_SIDE;
const IMAGE_BYTES: usize = 3 * PLANE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Cifar10,
    Cifar100,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl DatasetKind {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "cifar10",
            DatasetKind::Cifar100 => "cifar100",
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            DatasetKind::Cifar10 => 10,
            DatasetKind::Cifar100 => 100,
        }
    }

    /// Directory the official binary archive extracts to.
    pub fn archive_dir(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "cifar-10-batches-bin",
            DatasetKind::Cifar100 => "cifar-100-binary",
        }
    }

    /// Name of the precomputed corruption battery directory.
    pub fn corruption_dir(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "CIFAR-10-C",
            DatasetKind::Cifar100 => "CIFAR-100-C",
        }
    }

    fn label_bytes(&self) -> usize {
        match self {
            DatasetKind::Cifar10 => 1,
            DatasetKind::Cifar100 => 2,
        }
    }

    fn files(&self, split: Split) -> Vec<String> {
        match (self, split) {
            (DatasetKind::Cifar10, Split::Train) => (1..=5).map(|i| format!("data_batch_{}.bin", i)).collect(),
            (DatasetKind::Cifar10, Split::Test) => vec!["test_batch.bin".to_string()],
            (DatasetKind::Cifar100, Split::Train) => vec!["train.bin".to_string()],
            (DatasetKind::Cifar100, Split::Test) => vec!["test.bin".to_string()],
        }
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "cifar10" => Ok(DatasetKind::Cifar10),
            "cifar100" => Ok(DatasetKind::Cifar100),
            other => Err(format!("unknown dataset '{}' (expected cifar10 or cifar100)", other)),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `data_dir` itself, or its extracted-archive subdirectory when present.
pub fn resolve_dir(kind: DatasetKind, data_dir: &Path) -> PathBuf {
    let nested = data_dir.join(kind.archive_dir());
    if nested.is_dir() { nested } else { data_dir.to_path_buf() }
}

/// Loads one split of a CIFAR dataset from its binary files.
pub fn load_cifar(kind: DatasetKind, data_dir: &Path, split: Split) -> Result<ArrayDataset> {
    let dir = resolve_dir(kind, data_dir);
    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for file in kind.files(split) {
        let path = dir.join(&file);
        let bytes = fs::read(&path).map_err(|e| AugMixError::file(&path, e))?;
        decode_records(kind, &bytes, &path, &mut pixels, &mut labels)?;
    }

    info!(dataset = %kind, split = ?split, images = labels.len(), "Loaded dataset");
    let count = labels.len();
    ArrayDataset::new(ImageArray::new(count, CIFAR_SIDE, CIFAR_SIDE, pixels)?, labels)
}

fn decode_records(
    kind: DatasetKind,
    bytes: &[u8],
    path: &Path,
    pixels: &mut Vec<u8>,
    labels: &mut Vec<usize>,
) -> Result<()> {
    let header = kind.label_bytes();
    let record = header + IMAGE_BYTES;
    if bytes.is_empty() || bytes.len() % record != 0 {
        return Err(AugMixError::Dataset(format!(
            "{}: size {} is not a multiple of the {}-byte record",
            path.display(),
            bytes.len(),
            record
        )));
    }

    let num_classes = kind.num_classes();
    for rec in bytes.chunks_exact(record) {
        // The fine label is the last header byte.
        let label = rec[header - 1] as usize;
        if label >= num_classes {
            return Err(AugMixError::Dataset(format!(
                "{}: label {} out of range for {}",
                path.display(),
                label,
                kind
            )));
        }
        labels.push(label);

        let planes = &rec[header..];
        for i in 0..PLANE {
            pixels.push(planes[i]);
            pixels.push(planes[PLANE + i]);
            pixels.push(planes[2 * PLANE + i]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::LabeledImages;
    use image::Rgb;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn record(kind: DatasetKind, label: u8, rgb: [u8; 3]) -> Vec<u8> {
        let mut r = vec![0u8; kind.label_bytes()];
        *r.last_mut().unwrap() = label;
        for c in rgb {
            r.extend(std::iter::repeat(c).take(PLANE));
        }
        r
    }

    #[test]
    fn test_cifar100_uses_fine_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = record(DatasetKind::Cifar100, 42, [1, 2, 3]);
        bytes[0] = 7; // coarse label
        fs::write(dir.path().join("test.bin"), &bytes).unwrap();

        let ds = load_cifar(DatasetKind::Cifar100, dir.path(), Split::Test).unwrap();
        assert_eq!(ds.labels(), &[42]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (img, _) = ds.get_image(0, &mut rng);
        assert_eq!(*img.get_pixel(31, 31), Rgb([1, 2, 3]));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = record(DatasetKind::Cifar10, 1, [0, 0, 0]);
        bytes.pop();
        fs::write(dir.path().join("test_batch.bin"), &bytes).unwrap();
        assert!(load_cifar(DatasetKind::Cifar10, dir.path(), Split::Test).is_err());
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cifar(DatasetKind::Cifar10, dir.path(), Split::Train).unwrap_err();
        assert!(err.to_string().contains("data_batch_1.bin"));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("cifar10".parse::<DatasetKind>().unwrap(), DatasetKind::Cifar10);
        assert_eq!("CIFAR-100".parse::<DatasetKind>().unwrap(), DatasetKind::Cifar100);
        assert!("imagenet".parse::<DatasetKind>().is_err());
    }
}
