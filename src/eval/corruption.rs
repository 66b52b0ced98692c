use std::path::Path;

use tracing::info;

use crate::data::array::{ArrayDataset, ImageArray};
use crate::data::npy::NpyArray;
use crate::error::{AugMixError, Result};
use crate::eval::clean::{check_labels, test, EvalSettings};
use crate::network::model::Model;

/// The corruption battery, in evaluation order. Each name is a file
/// `{base}/{name}.npy` sharing `{base}/labels.npy`.
pub const CORRUPTIONS: [&str; 15] = [
    "gaussian_noise",
    "shot_noise",
    "impulse_noise",
    "defocus_blur",
    "glass_blur",
    "motion_blur",
    "zoom_blur",
    "snow",
    "frost",
    "fog",
    "brightness",
    "contrast",
    "elastic_transform",
    "pixelate",
    "jpeg_compression",
];

/// Mean accuracy over the full corruption battery.
pub fn test_c(model: &dyn Model, test_data: &ArrayDataset, base_path: &Path, settings: &EvalSettings) -> Result<f64> {
    test_c_with(model, test_data, base_path, &CORRUPTIONS, settings)
}

/// Mean accuracy over `corruptions`.
///
/// Each corruption is evaluated on a fresh handle from
/// [`ArrayDataset::with_arrays`]; `test_data` itself is never modified, so
/// clean evaluation may run before or after this.
pub fn test_c_with(
    model: &dyn Model,
    test_data: &ArrayDataset,
    base_path: &Path,
    corruptions: &[&str],
    settings: &EvalSettings,
) -> Result<f64> {
    if corruptions.is_empty() {
        return Err(AugMixError::Config("corruption list is empty".to_string()));
    }

    let labels_path = base_path.join("labels.npy");
    let labels = NpyArray::read(&labels_path)?.into_labels(&labels_path)?;
    check_labels(&labels, model.num_classes())
        .map_err(|e| AugMixError::array(&labels_path, e.to_string()))?;
    let (height, width) = test_data.image_shape();

    let mut accs = Vec::with_capacity(corruptions.len());
    for corruption in corruptions {
        let path = base_path.join(format!("{}.npy", corruption));
        let images = ImageArray::from_npy(&path)?;
        if (images.height, images.width) != (height, width) {
            return Err(AugMixError::array(
                &path,
                format!("images are {}x{}, expected {}x{}", images.height, images.width, height, width),
            ));
        }
        let corrupted = test_data.with_arrays(images, labels.clone())?;

        let (loss, acc) = test(model, &settings.loader(corrupted))?;
        info!(
            corruption = %corruption,
            test_loss = %format!("{:.3}", loss),
            test_error = %format!("{:.3}", 100.0 - 100.0 * acc),
            "Corruption evaluated"
        );
        accs.push(acc);
    }

    Ok(accs.iter().sum::<f64>() / accs.len() as f64)
}
