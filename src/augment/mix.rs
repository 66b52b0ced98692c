use std::sync::Arc;

use image::RgbImage;
use rand::{Rng, RngCore};
use rand_distr::{Beta, Dirichlet, Distribution};
use serde::{Deserialize, Serialize};

use crate::augment::ops::{OperatorSet, Severity};
use crate::augment::preprocess::{ImageTensor, Preprocess};
use crate::error::{AugMixError, Result};

/// Chain depth range used when no fixed depth is configured.
pub const STOCHASTIC_DEPTH: std::ops::RangeInclusive<usize> = 1..=3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugMixConfig {
    /// Number of augmentation chains mixed together.
    pub mixture_width: usize,
    /// Fixed chain depth; `None` draws a depth in `[1, 3]` per chain.
    pub mixture_depth: Option<usize>,
    pub severity: Severity,
    /// Also draw from the color/contrast/brightness/sharpness operators.
    pub all_ops: bool,
}

impl Default for AugMixConfig {
    fn default() -> Self {
        AugMixConfig { mixture_width: 3, mixture_depth: None, severity: Severity::default(), all_ops: false }
    }
}

impl AugMixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mixture_width == 0 {
            return Err(AugMixError::Config("mixture width must be at least 1".to_string()));
        }
        if self.mixture_depth == Some(0) {
            return Err(AugMixError::Config("mixture depth must be at least 1 when fixed".to_string()));
        }
        Ok(())
    }
}

/// The mixing engine: `(1 - m) · preprocess(x) + m · Σ wᵢ · preprocess(chainᵢ(x))`
/// with `w ~ Dirichlet(1, …, 1)` and `m ~ Beta(1, 1)`.
///
/// Every call draws fresh weights, chains and operators from the caller's
/// RNG; nothing is keyed on the sample index.
pub struct AugMix {
    config: AugMixConfig,
    operators: OperatorSet,
    preprocess: Arc<dyn Preprocess>,
    // Dirichlet needs at least two components; width 1 always weighs 1.0.
    dirichlet: Option<Dirichlet<f64>>,
    beta: Beta<f64>,
}

impl AugMix {
    pub fn new(config: AugMixConfig, preprocess: Arc<dyn Preprocess>) -> Result<AugMix> {
        config.validate()?;
        let dirichlet = if config.mixture_width >= 2 {
            let alpha = vec![1.0; config.mixture_width];
            Some(Dirichlet::new(&alpha).map_err(|e| AugMixError::Distribution(e.to_string()))?)
        } else {
            None
        };
        let beta = Beta::new(1.0, 1.0).map_err(|e| AugMixError::Distribution(e.to_string()))?;

        Ok(AugMix {
            config,
            operators: OperatorSet::select(config.all_ops),
            preprocess,
            dirichlet,
            beta,
        })
    }

    pub fn config(&self) -> &AugMixConfig {
        &self.config
    }

    pub fn operators(&self) -> OperatorSet {
        self.operators
    }

    pub fn preprocess(&self, image: &RgbImage) -> ImageTensor {
        self.preprocess.preprocess(image)
    }

    pub fn sample_weights(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        match &self.dirichlet {
            Some(d) => d.sample(rng),
            None => vec![1.0],
        }
    }

    pub fn sample_blend(&self, rng: &mut dyn RngCore) -> f64 {
        self.beta.sample(rng)
    }

    /// One augmented-and-mixed view of `image`.
    pub fn augment(&self, image: &RgbImage, rng: &mut dyn RngCore) -> ImageTensor {
        let weights = self.sample_weights(rng);
        let m = self.sample_blend(rng);
        self.mix_with(image, &weights, m, rng)
    }

    /// Mixes with explicit weights and blend coefficient; chains and operators
    /// are still drawn from `rng`.
    pub fn mix_with(&self, image: &RgbImage, weights: &[f64], m: f64, rng: &mut dyn RngCore) -> ImageTensor {
        assert_eq!(weights.len(), self.config.mixture_width, "one weight per chain");

        let clean = self.preprocess(image);
        let (c, h, w) = clean.shape();
        let mut mix = ImageTensor::zeros(c, h, w);
        for &weight in weights {
            let augmented = self.chain(image, rng);
            mix.add_scaled(&self.preprocess(&augmented), weight);
        }

        clean.lerp(&mix, m)
    }

    /// Applies `depth` randomly chosen operators to a copy of `image`.
    pub fn chain(&self, image: &RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        let depth = match self.config.mixture_depth {
            Some(d) => d,
            None => rng.gen_range(STOCHASTIC_DEPTH),
        };
        let mut current = image.clone();
        for _ in 0..depth {
            let op = self.operators.sample(rng);
            current = op.apply(&current, self.config.severity, rng);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::preprocess::Normalize;
    use image::Rgb;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine(width: usize, depth: Option<usize>) -> AugMix {
        let config = AugMixConfig { mixture_width: width, mixture_depth: depth, ..AugMixConfig::default() };
        AugMix::new(config, Arc::new(Normalize::default())).unwrap()
    }

    fn sample_image() -> RgbImage {
        RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, ((x + y) * 15) as u8]))
    }

    #[test]
    fn test_weights_sum_to_one_for_every_width() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for k in 1..=8 {
            let e = engine(k, None);
            for _ in 0..20 {
                let w = e.sample_weights(&mut rng);
                assert_eq!(w.len(), k);
                assert!(w.iter().all(|x| *x >= 0.0));
                assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_blend_returns_preprocessed_image() {
        let e = engine(3, Some(1));
        let img = sample_image();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let out = e.mix_with(&img, &[0.2, 0.3, 0.5], 0.0, &mut rng);
        assert_eq!(out, e.preprocess(&img));
    }

    #[test]
    fn test_full_blend_returns_mixture_only() {
        let e = engine(2, Some(2));
        let img = sample_image();
        let weights = [0.25, 0.75];

        // Replay the same RNG to rebuild the mixture by hand.
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = e.mix_with(&img, &weights, 1.0, &mut rng);

        let mut replay = ChaCha8Rng::seed_from_u64(3);
        let mut expected = ImageTensor::zeros(3, 8, 8);
        for w in weights {
            let chained = e.chain(&img, &mut replay);
            expected.add_scaled(&e.preprocess(&chained), w);
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn test_augment_keeps_shape_and_source() {
        let e = engine(3, None);
        let img = sample_image();
        let copy = img.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let out = e.augment(&img, &mut rng);
        assert_eq!(out.shape(), (3, 8, 8));
        assert!(out.data.iter().all(|v| (-1.0 - 1e-9..=1.0 + 1e-9).contains(v)));
        assert_eq!(img, copy);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = AugMixConfig { mixture_width: 0, ..AugMixConfig::default() };
        assert!(AugMix::new(bad, Arc::new(Normalize::default())).is_err());
        let bad = AugMixConfig { mixture_depth: Some(0), ..AugMixConfig::default() };
        assert!(bad.validate().is_err());
    }
}
