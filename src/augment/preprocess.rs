use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A normalized image in channel-major (CHW) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl ImageTensor {
    pub fn zeros(channels: usize, height: usize, width: usize) -> ImageTensor {
        ImageTensor { channels, height, width, data: vec![0.0; channels * height * width] }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[(c * self.height + y) * self.width + x]
    }

    /// `self += weight · other`.
    pub fn add_scaled(&mut self, other: &ImageTensor, weight: f64) {
        assert_eq!(self.shape(), other.shape(), "tensor shape mismatch");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += weight * b;
        }
    }

    /// `(1 - m) · self + m · other`.
    pub fn lerp(&self, other: &ImageTensor, m: f64) -> ImageTensor {
        assert_eq!(self.shape(), other.shape(), "tensor shape mismatch");
        let data = self.data.iter().zip(&other.data).map(|(a, b)| (1.0 - m) * a + m * b).collect();
        ImageTensor { channels: self.channels, height: self.height, width: self.width, data }
    }
}

/// Deterministic image-to-tensor conversion applied to every view.
pub trait Preprocess: Send + Sync {
    fn preprocess(&self, image: &RgbImage) -> ImageTensor;
}

/// Scales bytes to `[0, 1]` then applies per-channel `(x - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalize {
    pub mean: [f64; 3],
    pub std: [f64; 3],
}

impl Normalize {
    pub fn new(mean: [f64; 3], std: [f64; 3]) -> Normalize {
        assert!(std.iter().all(|s| *s > 0.0), "normalization std must be positive");
        Normalize { mean, std }
    }
}

impl Default for Normalize {
    /// Mean and std 0.5 on every channel, mapping pixels to `[-1, 1]`.
    fn default() -> Self {
        Normalize { mean: [0.5; 3], std: [0.5; 3] }
    }
}

impl Preprocess for Normalize {
    fn preprocess(&self, image: &RgbImage) -> ImageTensor {
        let (w, h) = image.dimensions();
        let (w, h) = (w as usize, h as usize);
        let mut tensor = ImageTensor::zeros(3, h, w);
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let v = pixel[c] as f64 / 255.0;
                tensor.data[(c * h + y) * w + x] = (v - self.mean[c]) / self.std[c];
            }
        }
        tensor
    }
}
