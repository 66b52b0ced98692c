use serde::{Deserialize, Serialize};

/// Hyper-parameters of the optimization loop.
///
/// # Fields
/// - `epochs`          — total passes over the training data
/// - `batch_size`      — training samples per mini-batch
/// - `eval_batch_size` — samples per batch during evaluation
/// - `consistency`     — feed (clean, aug1, aug2) triples and add the
///                       consistency penalty to the loss
/// - `print_freq`      — emit the smoothed loss every this many batches
/// - `num_workers`     — data-loading threads; `0` loads inline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    pub consistency: bool,
    pub print_freq: usize,
    pub num_workers: usize,
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig { epochs, batch_size, ..TrainConfig::default() }
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 100,
            batch_size: 128,
            eval_batch_size: 1000,
            consistency: true,
            print_freq: 50,
            num_workers: 4,
        }
    }
}
