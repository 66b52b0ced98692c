use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use rand::RngCore;

use crate::data::dataset::LabeledImages;
use crate::data::npy::NpyArray;
use crate::data::transform::RandomCropFlip;
use crate::error::{AugMixError, Result};

/// A stack of 8-bit RGB images stored `[count, height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArray {
    pub count: usize,
    pub height: usize,
    pub width: usize,
    pub pixels: Vec<u8>,
}

impl ImageArray {
    pub fn new(count: usize, height: usize, width: usize, pixels: Vec<u8>) -> Result<ImageArray> {
        let expected = count * height * width * 3;
        if pixels.len() != expected {
            return Err(AugMixError::Dataset(format!(
                "image array of {}x{}x{}x3 needs {} bytes, got {}",
                count, height, width, expected, pixels.len()
            )));
        }
        Ok(ImageArray { count, height, width, pixels })
    }

    /// Loads a `[N, H, W, 3]` uint8 `.npy` file.
    pub fn from_npy(path: &Path) -> Result<ImageArray> {
        let array = NpyArray::read(path)?;
        let shape = array.shape.clone();
        match shape.as_slice() {
            &[n, h, w, 3] => {
                let pixels = array.into_u8(path)?;
                ImageArray::new(n, h, w, pixels)
            }
            other => Err(AugMixError::array(path, format!("expected shape [N, H, W, 3], got {:?}", other))),
        }
    }

    pub fn image(&self, index: usize) -> RgbImage {
        assert!(index < self.count, "image index {} out of range for {} images", index, self.count);
        let base = index * self.height * self.width * 3;
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let i = base + (y as usize * self.width + x as usize) * 3;
            Rgb([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
        })
    }
}

/// An in-memory labeled image dataset with an optional train-time transform.
///
/// Pixel storage is shared, so clones and `with_arrays` handles are cheap.
#[derive(Debug, Clone)]
pub struct ArrayDataset {
    images: Arc<ImageArray>,
    labels: Arc<Vec<usize>>,
    transform: Option<RandomCropFlip>,
}

impl ArrayDataset {
    pub fn new(images: ImageArray, labels: Vec<usize>) -> Result<ArrayDataset> {
        if images.count != labels.len() {
            return Err(AugMixError::Dataset(format!(
                "{} images but {} labels",
                images.count,
                labels.len()
            )));
        }
        Ok(ArrayDataset { images: Arc::new(images), labels: Arc::new(labels), transform: None })
    }

    pub fn with_transform(mut self, transform: RandomCropFlip) -> ArrayDataset {
        self.transform = Some(transform);
        self
    }

    /// A new handle over replacement arrays with this dataset's transform.
    /// `self` is left untouched.
    pub fn with_arrays(&self, images: ImageArray, labels: Vec<usize>) -> Result<ArrayDataset> {
        let mut replaced = ArrayDataset::new(images, labels)?;
        replaced.transform = self.transform;
        Ok(replaced)
    }

    pub fn images(&self) -> &ImageArray {
        &self.images
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn image_shape(&self) -> (usize, usize) {
        (self.images.height, self.images.width)
    }
}

impl LabeledImages for ArrayDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get_image(&self, index: usize, rng: &mut dyn RngCore) -> (RgbImage, usize) {
        let image = self.images.image(index);
        let image = match &self.transform {
            Some(t) => t.apply(&image, rng),
            None => image,
        };
        (image, self.labels[index])
    }
}
