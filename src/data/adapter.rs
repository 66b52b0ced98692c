use std::sync::Arc;

use rand::RngCore;

use crate::augment::mix::AugMix;
use crate::augment::preprocess::Preprocess;
use crate::data::dataset::{Dataset, LabeledImages, Sample, SampleInput};

/// Wraps a labeled image dataset and yields AugMix training samples.
///
/// With consistency on, each sample is `(clean, aug1, aug2)` where the two
/// augmented views come from separate, independent engine calls.
pub struct AugMixDataset<D> {
    base: D,
    engine: Arc<AugMix>,
    consistency: bool,
}

impl<D: LabeledImages> AugMixDataset<D> {
    pub fn new(base: D, engine: Arc<AugMix>, consistency: bool) -> Self {
        AugMixDataset { base, engine, consistency }
    }

    pub fn consistency(&self) -> bool {
        self.consistency
    }

    pub fn base(&self) -> &D {
        &self.base
    }
}

impl<D: LabeledImages> Dataset for AugMixDataset<D> {
    fn len(&self) -> usize {
        self.base.len()
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Sample {
        let (image, label) = self.base.get_image(index, rng);
        let input = if self.consistency {
            SampleInput::Triple([
                self.engine.preprocess(&image),
                self.engine.augment(&image, rng),
                self.engine.augment(&image, rng),
            ])
        } else {
            SampleInput::Single(self.engine.augment(&image, rng))
        };
        Sample { input, label }
    }
}

/// Plain preprocessing, for evaluation sets.
pub struct PreprocessedDataset<D> {
    base: D,
    preprocess: Arc<dyn Preprocess>,
}

impl<D: LabeledImages> PreprocessedDataset<D> {
    pub fn new(base: D, preprocess: Arc<dyn Preprocess>) -> Self {
        PreprocessedDataset { base, preprocess }
    }
}

impl<D: LabeledImages> Dataset for PreprocessedDataset<D> {
    fn len(&self) -> usize {
        self.base.len()
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Sample {
        let (image, label) = self.base.get_image(index, rng);
        Sample { input: SampleInput::Single(self.preprocess.preprocess(&image)), label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::mix::AugMixConfig;
    use crate::augment::preprocess::Normalize;
    use crate::data::array::{ArrayDataset, ImageArray};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn toy() -> ArrayDataset {
        let pixels: Vec<u8> = (0..2 * 8 * 8 * 3).map(|i| (i * 13 % 256) as u8).collect();
        ArrayDataset::new(ImageArray::new(2, 8, 8, pixels).unwrap(), vec![0, 1]).unwrap()
    }

    fn engine() -> Arc<AugMix> {
        Arc::new(AugMix::new(AugMixConfig::default(), Arc::new(Normalize::default())).unwrap())
    }

    #[test]
    fn test_consistency_yields_clean_plus_two_views() {
        let ds = AugMixDataset::new(toy(), engine(), true);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let sample = ds.get(1, &mut rng);
        assert_eq!(sample.label, 1);
        match &sample.input {
            SampleInput::Triple([clean, a, b]) => {
                let (img, _) = toy().get_image(1, &mut rng);
                assert_eq!(*clean, Normalize::default().preprocess(&img));
                assert_eq!(a.shape(), clean.shape());
                assert_ne!(a, b);
            }
            other => panic!("expected triple, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_mode_yields_single_view() {
        let ds = AugMixDataset::new(toy(), engine(), false);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        assert_eq!(ds.len(), 2);
        assert!(matches!(ds.get(0, &mut rng).input, SampleInput::Single(_)));
    }
}
