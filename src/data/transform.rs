use image::{imageops, Rgb, RgbImage};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Train-time geometry applied before augmentation: a horizontal flip with
/// probability `flip_prob`, then a random `size`×`size` crop of the image
/// zero-padded by `padding` pixels on every side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomCropFlip {
    pub size: u32,
    pub padding: u32,
    pub flip_prob: f64,
}

impl RandomCropFlip {
    pub fn new(size: u32, padding: u32) -> RandomCropFlip {
        RandomCropFlip { size, padding, flip_prob: 0.5 }
    }

    /// The CIFAR setting: 32×32 crops with 4 pixels of padding.
    pub fn cifar() -> RandomCropFlip {
        RandomCropFlip::new(32, 4)
    }

    pub fn apply(&self, image: &RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        let flipped = if rng.gen::<f64>() < self.flip_prob {
            imageops::flip_horizontal(image)
        } else {
            image.clone()
        };

        let (w, h) = flipped.dimensions();
        let (pw, ph) = (w + 2 * self.padding, h + 2 * self.padding);
        assert!(
            self.size <= pw && self.size <= ph,
            "crop size {} exceeds padded image {}x{}",
            self.size, pw, ph
        );

        let top = rng.gen_range(0..=ph - self.size);
        let left = rng.gen_range(0..=pw - self.size);

        // Output (x, y) reads padded (left + x, top + y); outside the source is black.
        RgbImage::from_fn(self.size, self.size, |x, y| {
            let sx = (left + x) as i64 - self.padding as i64;
            let sy = (top + y) as i64 - self.padding as i64;
            if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                Rgb([0, 0, 0])
            } else {
                *flipped.get_pixel(sx as u32, sy as u32)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_output_has_crop_size() {
        let img = RgbImage::from_pixel(32, 32, Rgb([200, 10, 10]));
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(RandomCropFlip::cifar().apply(&img, &mut rng).dimensions(), (32, 32));
        }
    }

    #[test]
    fn test_no_padding_no_flip_is_identity() {
        let img = RgbImage::from_fn(5, 5, |x, y| Rgb([x as u8, y as u8, 0]));
        let t = RandomCropFlip { size: 5, padding: 0, flip_prob: 0.0 };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(t.apply(&img, &mut rng), img);
    }

    #[test]
    fn test_padding_introduces_only_black_or_source_pixels() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let t = RandomCropFlip::new(8, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = t.apply(&img, &mut rng);
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0]) || *p == Rgb([255, 255, 255])));
    }
}
