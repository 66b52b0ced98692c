//! Augmentation operators.
//!
//! Every operator maps an RGB image to a new RGB image of the same size. The
//! strength of each operator is drawn from `[0.1, severity]` on every call,
//! and geometric operators pick their direction at random, so operators take
//! the caller's RNG.

use std::fmt;

use image::{Rgb, RgbImage};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{AugMixError, Result};

/// Smallest width/height every operator accepts.
pub const MIN_IMAGE_SIDE: u32 = 3;

/// Augmentation intensity in `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Severity(u32);

impl Severity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    pub fn new(level: u32) -> Result<Severity> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Severity(level))
        } else {
            Err(AugMixError::Config(format!(
                "augmentation severity must be in [{}, {}], got {}",
                Self::MIN,
                Self::MAX,
                level
            )))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Severity {
    type Error = AugMixError;

    fn try_from(level: u32) -> Result<Self> {
        Severity::new(level)
    }
}

impl From<Severity> for u32 {
    fn from(s: Severity) -> u32 {
        s.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity(3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AutoContrast,
    Equalize,
    Posterize,
    Rotate,
    Solarize,
    ShearX,
    ShearY,
    TranslateX,
    TranslateY,
    Color,
    Contrast,
    Brightness,
    Sharpness,
}

/// Geometric and histogram operators; no color/contrast/brightness/sharpness
/// so they cannot overlap with the corruption benchmark.
pub const BASE_OPERATIONS: [Operation; 9] = [
    Operation::AutoContrast,
    Operation::Equalize,
    Operation::Posterize,
    Operation::Rotate,
    Operation::Solarize,
    Operation::ShearX,
    Operation::ShearY,
    Operation::TranslateX,
    Operation::TranslateY,
];

pub const ALL_OPERATIONS: [Operation; 13] = [
    Operation::AutoContrast,
    Operation::Equalize,
    Operation::Posterize,
    Operation::Rotate,
    Operation::Solarize,
    Operation::ShearX,
    Operation::ShearY,
    Operation::TranslateX,
    Operation::TranslateY,
    Operation::Color,
    Operation::Contrast,
    Operation::Brightness,
    Operation::Sharpness,
];

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AutoContrast => "autocontrast",
            Operation::Equalize => "equalize",
            Operation::Posterize => "posterize",
            Operation::Rotate => "rotate",
            Operation::Solarize => "solarize",
            Operation::ShearX => "shear_x",
            Operation::ShearY => "shear_y",
            Operation::TranslateX => "translate_x",
            Operation::TranslateY => "translate_y",
            Operation::Color => "color",
            Operation::Contrast => "contrast",
            Operation::Brightness => "brightness",
            Operation::Sharpness => "sharpness",
        }
    }

    pub fn from_name(name: &str) -> Option<Operation> {
        ALL_OPERATIONS.iter().copied().find(|op| op.name() == name)
    }

    /// Applies the operator to a copy of `image`.
    ///
    /// # Panics
    /// Panics if either side of `image` is smaller than `MIN_IMAGE_SIDE`.
    pub fn apply(&self, image: &RgbImage, severity: Severity, rng: &mut dyn RngCore) -> RgbImage {
        let (w, h) = image.dimensions();
        assert!(
            w >= MIN_IMAGE_SIDE && h >= MIN_IMAGE_SIDE,
            "augmentation requires images of at least {0}x{0}, got {1}x{2}",
            MIN_IMAGE_SIDE, w, h
        );
        let s = severity.get();

        match self {
            Operation::AutoContrast => autocontrast(image),
            Operation::Equalize => equalize(image),
            Operation::Posterize => {
                let bits = 4 - int_parameter(sample_level(s, rng), 4.0);
                posterize(image, bits.clamp(1, 8) as u32)
            }
            Operation::Rotate => {
                let degrees = random_sign(int_parameter(sample_level(s, rng), 30.0) as f64, rng);
                rotate(image, degrees)
            }
            Operation::Solarize => {
                let threshold = 256 - int_parameter(sample_level(s, rng), 256.0);
                solarize(image, threshold)
            }
            Operation::ShearX => {
                let level = random_sign(float_parameter(sample_level(s, rng), 0.3), rng);
                affine(image, [1.0, level, 0.0, 0.0, 1.0, 0.0])
            }
            Operation::ShearY => {
                let level = random_sign(float_parameter(sample_level(s, rng), 0.3), rng);
                affine(image, [1.0, 0.0, 0.0, level, 1.0, 0.0])
            }
            Operation::TranslateX => {
                let pixels = int_parameter(sample_level(s, rng), w as f64 / 3.0) as f64;
                affine(image, [1.0, 0.0, random_sign(pixels, rng), 0.0, 1.0, 0.0])
            }
            Operation::TranslateY => {
                let pixels = int_parameter(sample_level(s, rng), h as f64 / 3.0) as f64;
                affine(image, [1.0, 0.0, 0.0, 0.0, 1.0, random_sign(pixels, rng)])
            }
            Operation::Color => {
                let degenerate = grayscale(image);
                blend(&degenerate, image, enhance_factor(s, rng))
            }
            Operation::Contrast => {
                let mean = mean_luma(image);
                let degenerate = RgbImage::from_pixel(w, h, Rgb([mean, mean, mean]));
                blend(&degenerate, image, enhance_factor(s, rng))
            }
            Operation::Brightness => {
                let degenerate = RgbImage::new(w, h);
                blend(&degenerate, image, enhance_factor(s, rng))
            }
            Operation::Sharpness => {
                let degenerate = smooth(image);
                blend(&degenerate, image, enhance_factor(s, rng))
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operators a mixture chain draws from.
#[derive(Debug, Clone, Copy)]
pub struct OperatorSet {
    ops: &'static [Operation],
}

impl OperatorSet {
    pub fn base() -> OperatorSet {
        OperatorSet { ops: &BASE_OPERATIONS }
    }

    pub fn all() -> OperatorSet {
        OperatorSet { ops: &ALL_OPERATIONS }
    }

    pub fn select(all_ops: bool) -> OperatorSet {
        if all_ops { OperatorSet::all() } else { OperatorSet::base() }
    }

    pub fn operations(&self) -> &'static [Operation] {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Operation> {
        self.ops.iter().copied().find(|op| op.name() == name)
    }

    /// Uniformly random operator.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Operation {
        self.ops[rng.gen_range(0..self.ops.len())]
    }
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

/// Uniform in `[0.1, severity)`.
fn sample_level(severity: u32, rng: &mut dyn RngCore) -> f64 {
    rng.gen_range(0.1..severity as f64)
}

/// `level` in `[0, 10]` scaled to `[0, max]` and truncated.
fn int_parameter(level: f64, max: f64) -> i32 {
    (level * max / 10.0) as i32
}

fn float_parameter(level: f64, max: f64) -> f64 {
    level * max / 10.0
}

fn random_sign(value: f64, rng: &mut dyn RngCore) -> f64 {
    if rng.gen::<f64>() > 0.5 { -value } else { value }
}

fn enhance_factor(severity: u32, rng: &mut dyn RngCore) -> f64 {
    float_parameter(sample_level(severity, rng), 1.8) + 0.1
}

// ---------------------------------------------------------------------------
// Pixel operations
// ---------------------------------------------------------------------------

fn map_channels<F>(image: &RgbImage, lut: F) -> RgbImage
where
    F: Fn(usize, u8) -> u8,
{
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            pixel[c] = lut(c, pixel[c]);
        }
    }
    out
}

fn histograms(image: &RgbImage) -> [[u32; 256]; 3] {
    let mut hist = [[0u32; 256]; 3];
    for pixel in image.pixels() {
        for c in 0..3 {
            hist[c][pixel[c] as usize] += 1;
        }
    }
    hist
}

/// Stretches each channel so its darkest value maps to 0 and brightest to 255.
fn autocontrast(image: &RgbImage) -> RgbImage {
    let hist = histograms(image);
    let mut luts = [[0u8; 256]; 3];
    for c in 0..3 {
        let lo = hist[c].iter().position(|&n| n > 0).unwrap_or(0);
        let hi = hist[c].iter().rposition(|&n| n > 0).unwrap_or(255);
        for (i, v) in luts[c].iter_mut().enumerate() {
            *v = if hi <= lo {
                i as u8
            } else {
                let scale = 255.0 / (hi - lo) as f64;
                let offset = -(lo as f64) * scale;
                (i as f64 * scale + offset).clamp(0.0, 255.0) as u8
            };
        }
    }
    map_channels(image, |c, v| luts[c][v as usize])
}

/// Per-channel histogram equalization.
fn equalize(image: &RgbImage) -> RgbImage {
    let hist = histograms(image);
    let mut luts = [[0u8; 256]; 3];
    for c in 0..3 {
        let used: Vec<u32> = hist[c].iter().copied().filter(|&n| n > 0).collect();
        let step = if used.len() <= 1 {
            0
        } else {
            (used.iter().sum::<u32>() - used[used.len() - 1]) / 255
        };
        for (i, v) in luts[c].iter_mut().enumerate() {
            *v = i as u8;
        }
        if step == 0 {
            continue;
        }
        let mut n = step / 2;
        for i in 0..256 {
            luts[c][i] = (n / step).min(255) as u8;
            n += hist[c][i];
        }
    }
    map_channels(image, |c, v| luts[c][v as usize])
}

fn posterize(image: &RgbImage, bits: u32) -> RgbImage {
    let mask = !((1u16 << (8 - bits)) - 1) as u8;
    map_channels(image, |_, v| v & mask)
}

/// Inverts every channel value at or above `threshold`.
fn solarize(image: &RgbImage, threshold: i32) -> RgbImage {
    map_channels(image, |_, v| if (v as i32) < threshold { v } else { 255 - v })
}

/// Counter-clockwise rotation about the image center.
fn rotate(image: &RgbImage, degrees: f64) -> RgbImage {
    let (w, h) = image.dimensions();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let theta = -degrees.to_radians();
    let (a, b, d, e) = (theta.cos(), theta.sin(), -theta.sin(), theta.cos());
    let c = a * -cx + b * -cy + cx;
    let f = d * -cx + e * -cy + cy;
    affine(image, [a, b, c, d, e, f])
}

/// Inverse-mapped affine warp: output `(x, y)` samples the input at
/// `(a·x + b·y + c, d·x + e·y + f)`, bilinear, black outside the frame.
fn affine(image: &RgbImage, coeffs: [f64; 6]) -> RgbImage {
    let [a, b, c, d, e, f] = coeffs;
    let (w, h) = image.dimensions();
    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            // Pixel centers sit at +0.5.
            let (xc, yc) = (x as f64 + 0.5, y as f64 + 0.5);
            let sx = a * xc + b * yc + c;
            let sy = d * xc + e * yc + f;
            out.put_pixel(x, y, bilinear_sample(image, sx, sy));
        }
    }
    out
}

fn bilinear_sample(image: &RgbImage, sx: f64, sy: f64) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    if sx < 0.0 || sy < 0.0 || sx > w as f64 || sy > h as f64 {
        return Rgb([0, 0, 0]);
    }

    let fx = (sx - 0.5).clamp(0.0, (w - 1) as f64);
    let fy = (sy - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f64 * (1.0 - tx) * (1.0 - ty)
            + p10[c] as f64 * tx * (1.0 - ty)
            + p01[c] as f64 * (1.0 - tx) * ty
            + p11[c] as f64 * tx * ty;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(result)
}

/// ITU-R 601-2 luma, fixed-point.
fn luma(p: &Rgb<u8>) -> u8 {
    ((p[0] as u32 * 19595 + p[1] as u32 * 38470 + p[2] as u32 * 7471 + 0x8000) >> 16) as u8
}

fn grayscale(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let l = luma(pixel);
        *pixel = Rgb([l, l, l]);
    }
    out
}

fn mean_luma(image: &RgbImage) -> u8 {
    let n = image.pixels().len() as f64;
    let sum: f64 = image.pixels().map(|p| luma(p) as f64).sum();
    (sum / n + 0.5).clamp(0.0, 255.0) as u8
}

/// 3x3 smoothing kernel `[[1,1,1],[1,5,1],[1,1,1]] / 13`; border pixels are
/// copied unchanged.
fn smooth(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    let p = image.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += weight * p[c] as u32;
                    }
                }
            }
            out.put_pixel(x, y, Rgb(acc.map(|v| ((v as f64 / 13.0).round()).min(255.0) as u8)));
        }
    }
    out
}

/// `degenerate + factor · (image - degenerate)`, clipped to `[0, 255]`.
fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f64) -> RgbImage {
    let mut out = image.clone();
    for (o, d) in out.pixels_mut().zip(degenerate.pixels()) {
        for c in 0..3 {
            let v = d[c] as f64 + factor * (o[c] as f64 - d[c] as f64);
            o[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
