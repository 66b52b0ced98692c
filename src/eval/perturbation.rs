use std::path::Path;

use tracing::info;

use crate::data::npy::NpyArray;
use crate::error::{AugMixError, Result};
use crate::math::matrix::Matrix;
use crate::network::model::Model;

/// The perturbation battery, in evaluation order. Each name is a file
/// `{base}/{name}.npy` holding `[clips, frames, H, W, 3]` uint8 sequences.
pub const PERTURBATIONS: [&str; 20] = [
    "brightness",
    "gaussian_blur",
    "gaussian_noise_2",
    "gaussian_noise_3",
    "gaussian_noise",
    "motion_blur",
    "rotate",
    "scale",
    "shear",
    "shot_noise_2",
    "shot_noise_3",
    "shot_noise",
    "snow",
    "spatter",
    "speckle_noise_2",
    "speckle_noise_3",
    "speckle_noise",
    "tilt",
    "translate",
    "zoom_blur",
];

/// Noise sequences are compared against their first frame, all others
/// frame-to-frame.
pub fn is_noise_perturbation(name: &str) -> bool {
    name.contains("noise")
}

/// Mean per-clip rate of prediction flips.
///
/// For each clip the frames after the first are compared to a reference
/// frame: the first frame when `noise_perturbation` is set, otherwise the
/// previous frame. Clips with fewer than two frames contribute 0. An empty
/// prediction list gives 0.
pub fn flip_prob(predictions: &[Vec<usize>], noise_perturbation: bool) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }

    let mut result = 0.0;
    for clip in predictions {
        let Some((&first, rest)) = clip.split_first() else { continue };
        if rest.is_empty() {
            continue;
        }
        let mut reference = first;
        let mut flips = 0usize;
        for &pred in rest {
            if pred != reference {
                flips += 1;
            }
            if !noise_perturbation {
                reference = pred;
            }
        }
        result += flips as f64 / rest.len() as f64 / predictions.len() as f64;
    }
    result
}

/// `[clips, frames, H, W, 3]` uint8 sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipArray {
    pub clips: usize,
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub pixels: Vec<u8>,
}

impl ClipArray {
    pub fn from_npy(path: &Path) -> Result<ClipArray> {
        let array = NpyArray::read(path)?;
        let shape = array.shape.clone();
        match shape.as_slice() {
            &[clips, frames, height, width, 3] => {
                let pixels = array.into_u8(path)?;
                Ok(ClipArray { clips, frames, height, width, pixels })
            }
            other => Err(AugMixError::array(
                path,
                format!("expected shape [clips, frames, H, W, 3], got {:?}", other),
            )),
        }
    }

    fn frame_len(&self) -> usize {
        self.height * self.width * 3
    }

    /// Frames of clips `start..end` as rows in CHW order, scaled to `[-1, 1]`.
    fn frames_matrix(&self, start: usize, end: usize) -> Matrix {
        let (h, w) = (self.height, self.width);
        let frame_len = self.frame_len();
        let rows = (end - start) * self.frames;
        let mut data = Vec::with_capacity(rows * frame_len);

        for frame in start * self.frames..end * self.frames {
            let hwc = &self.pixels[frame * frame_len..(frame + 1) * frame_len];
            for c in 0..3 {
                for y in 0..h {
                    for x in 0..w {
                        let v = hwc[(y * w + x) * 3 + c] as f64 / 255.0;
                        data.push(v * 2.0 - 1.0);
                    }
                }
            }
        }
        Matrix::from_vec(rows, frame_len, data)
    }
}

/// Argmax prediction for every frame, grouped by clip.
pub fn predict_clips(model: &dyn Model, clips: &ClipArray, clips_per_batch: usize) -> Vec<Vec<usize>> {
    let clips_per_batch = clips_per_batch.max(1);
    let mut predictions = Vec::with_capacity(clips.clips);
    if clips.frames == 0 {
        return vec![Vec::new(); clips.clips];
    }

    let mut start = 0;
    while start < clips.clips {
        let end = (start + clips_per_batch).min(clips.clips);
        let logits = model.predict(&clips.frames_matrix(start, end));
        let preds = logits.argmax_rows();
        predictions.extend(preds.chunks(clips.frames).map(|c| c.to_vec()));
        start = end;
    }
    predictions
}

/// Mean flip probability over the full perturbation battery.
pub fn test_p(model: &dyn Model, base_path: &Path, clips_per_batch: usize) -> Result<f64> {
    test_p_with(model, base_path, &PERTURBATIONS, clips_per_batch)
}

pub fn test_p_with(model: &dyn Model, base_path: &Path, perturbations: &[&str], clips_per_batch: usize) -> Result<f64> {
    if perturbations.is_empty() {
        return Err(AugMixError::Config("perturbation list is empty".to_string()));
    }

    let mut flips = Vec::with_capacity(perturbations.len());
    for perturbation in perturbations {
        let path = base_path.join(format!("{}.npy", perturbation));
        let clips = ClipArray::from_npy(&path)?;
        if clips.frame_len() != model.input_dim() {
            return Err(AugMixError::array(
                &path,
                format!(
                    "frames are {}x{}x3, model '{}' expects {} values",
                    clips.height,
                    clips.width,
                    model.name(),
                    model.input_dim()
                ),
            ));
        }
        let predictions = predict_clips(model, &clips, clips_per_batch);
        let rate = flip_prob(&predictions, is_noise_perturbation(perturbation));
        info!(perturbation = %perturbation, flipping_rate = rate, "Perturbation evaluated");
        flips.push(rate);
    }

    Ok(flips.iter().sum::<f64>() / flips.len() as f64)
}
