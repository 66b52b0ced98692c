use image::RgbImage;
use rand::RngCore;

use crate::augment::preprocess::ImageTensor;
use crate::math::matrix::Matrix;

/// An indexable collection of labeled images. `get_image` may apply a random
/// train-time transform, so it takes the caller's RNG.
pub trait LabeledImages: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_image(&self, index: usize, rng: &mut dyn RngCore) -> (RgbImage, usize);
}

/// Model inputs for one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleInput {
    Single(ImageTensor),
    /// Clean view followed by two independent augmentations.
    Triple([ImageTensor; 3]),
}

impl SampleInput {
    pub fn views(&self) -> &[ImageTensor] {
        match self {
            SampleInput::Single(t) => std::slice::from_ref(t),
            SampleInput::Triple(ts) => ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: SampleInput,
    pub label: usize,
}

/// An indexable collection of model-ready samples.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Sample;
}

/// A collated mini-batch: one matrix per view (rows = samples, cols = C·H·W).
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub views: Vec<Matrix>,
    pub targets: Vec<usize>,
}

impl Batch {
    /// Stacks samples row-wise.
    ///
    /// # Panics
    /// Panics on an empty slice or if samples disagree on view count or size.
    pub fn collate(samples: &[Sample]) -> Batch {
        assert!(!samples.is_empty(), "cannot collate an empty batch");
        let n_views = samples[0].input.views().len();
        let dim = samples[0].input.views()[0].len();

        let mut views: Vec<Vec<f64>> = vec![Vec::with_capacity(samples.len() * dim); n_views];
        let mut targets = Vec::with_capacity(samples.len());
        for sample in samples {
            let sample_views = sample.input.views();
            assert_eq!(sample_views.len(), n_views, "samples disagree on view count");
            for (buf, view) in views.iter_mut().zip(sample_views) {
                assert_eq!(view.len(), dim, "samples disagree on tensor size");
                buf.extend_from_slice(&view.data);
            }
            targets.push(sample.label);
        }

        Batch {
            views: views.into_iter().map(|data| Matrix::from_vec(samples.len(), dim, data)).collect(),
            targets,
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(v: f64) -> ImageTensor {
        ImageTensor { channels: 1, height: 1, width: 2, data: vec![v, -v] }
    }

    #[test]
    fn test_collate_triples() {
        let samples: Vec<Sample> = (0..3)
            .map(|i| Sample {
                input: SampleInput::Triple([tensor(i as f64), tensor(10.0 + i as f64), tensor(20.0 + i as f64)]),
                label: i,
            })
            .collect();
        let batch = Batch::collate(&samples);
        assert_eq!(batch.views.len(), 3);
        assert_eq!(batch.views[1].shape(), (3, 2));
        assert_eq!(batch.views[1].row(2), &[12.0, -12.0]);
        assert_eq!(batch.targets, vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "view count")]
    fn test_mixed_arity_is_rejected() {
        let samples = vec![
            Sample { input: SampleInput::Single(tensor(1.0)), label: 0 },
            Sample { input: SampleInput::Triple([tensor(1.0), tensor(1.0), tensor(1.0)]), label: 0 },
        ];
        Batch::collate(&samples);
    }
}
