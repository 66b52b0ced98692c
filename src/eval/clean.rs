use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::augment::preprocess::Preprocess;
use crate::data::adapter::PreprocessedDataset;
use crate::data::array::ArrayDataset;
use crate::data::dataset::Batch;
use crate::data::loader::DataLoader;
use crate::error::{AugMixError, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::network::model::Model;

/// How evaluation sets are batched and preprocessed.
#[derive(Clone)]
pub struct EvalSettings {
    pub batch_size: usize,
    pub num_workers: usize,
    pub preprocess: Arc<dyn Preprocess>,
}

impl EvalSettings {
    pub fn new(batch_size: usize, num_workers: usize, preprocess: Arc<dyn Preprocess>) -> Self {
        EvalSettings { batch_size, num_workers, preprocess }
    }

    /// In-order, unshuffled loader over `dataset`.
    pub fn loader(&self, dataset: ArrayDataset) -> DataLoader {
        let dataset = PreprocessedDataset::new(dataset, Arc::clone(&self.preprocess));
        DataLoader::new(Arc::new(dataset), self.batch_size).num_workers(self.num_workers)
    }
}

/// Clean evaluation: `(loss, accuracy)`.
///
/// The loss is the per-sample mean cross-entropy and accuracy is the top-1
/// fraction. The model is only read. Rows that do not fit the model's input
/// and labels outside its classes are dataset errors.
pub fn test(model: &dyn Model, loader: &DataLoader) -> Result<(f64, f64)> {
    let n = loader.dataset_len();
    if n == 0 {
        return Ok((0.0, 0.0));
    }

    // Evaluation sets carry no random transform; the seed only fixes the plan.
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut total_loss = 0.0;
    let mut total_correct = 0;
    for batch in loader.iter(&mut rng) {
        let batch = batch?;
        check_batch(model, &batch)?;
        let logits = model.predict(&batch.views[0]);
        total_loss += CrossEntropyLoss::loss(&logits, &batch.targets) * batch.len() as f64;
        total_correct += CrossEntropyLoss::correct(&logits, &batch.targets);
    }

    Ok((total_loss / n as f64, total_correct as f64 / n as f64))
}

fn check_batch(model: &dyn Model, batch: &Batch) -> Result<()> {
    let cols = batch.views[0].cols;
    if cols != model.input_dim() {
        return Err(AugMixError::Dataset(format!(
            "samples have {} values, model '{}' expects {}",
            cols,
            model.name(),
            model.input_dim()
        )));
    }
    check_labels(&batch.targets, model.num_classes())
}

/// Every label must index one of `num_classes` logits.
pub fn check_labels(labels: &[usize], num_classes: usize) -> Result<()> {
    match labels.iter().find(|&&l| l >= num_classes) {
        Some(l) => Err(AugMixError::Dataset(format!(
            "label {} out of range for {} classes",
            l, num_classes
        ))),
        None => Ok(()),
    }
}
