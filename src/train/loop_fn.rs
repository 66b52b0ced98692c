use rand::RngCore;
use tracing::{debug, info};

use crate::data::dataset::Batch;
use crate::data::loader::DataLoader;
use crate::error::Result;
use crate::loss::consistency::JsdConsistencyLoss;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::Scheduler;
use crate::train::train_config::TrainConfig;

/// Decay of the reported training-loss moving average.
pub const LOSS_EMA_DECAY: f64 = 0.9;

/// What one optimization step computed.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// `cross_entropy + consistency`.
    pub loss: f64,
    pub cross_entropy: f64,
    /// The weighted consistency term; `None` for single-view batches.
    pub consistency: Option<f64>,
    /// Logits of the clean (or only) view, `[batch, classes]`.
    pub logits: Matrix,
}

/// Zeroes gradients, runs forward/backward on `batch`, then steps the
/// optimizer and the per-batch learning-rate schedule.
///
/// A single-view batch is trained on cross-entropy alone. A three-view batch
/// is stacked into one forward pass and additionally pays the consistency
/// penalty across the views.
///
/// # Panics
/// Panics if the batch has a view count other than 1 or 3.
pub fn train_step(
    model: &mut dyn Model,
    optimizer: &mut Optimizer,
    scheduler: &mut Scheduler,
    batch: &Batch,
) -> StepOutput {
    optimizer.zero_grad(model);

    let output = match batch.views.as_slice() {
        [single] => {
            let logits = model.forward(single);
            let (ce, grad) = CrossEntropyLoss::loss_and_grad(&logits, &batch.targets);
            model.backward(&grad);
            StepOutput { loss: ce, cross_entropy: ce, consistency: None, logits }
        }
        [clean, aug1, aug2] => {
            let stacked = Matrix::vstack(&[clean, aug1, aug2]);
            let all_logits = model.forward(&stacked);
            let parts = all_logits.split_rows(batch.len());
            let (logits_clean, logits_aug1, logits_aug2) = (&parts[0], &parts[1], &parts[2]);

            let (ce, grad_ce) = CrossEntropyLoss::loss_and_grad(logits_clean, &batch.targets);
            let (js, [g_clean, g_aug1, g_aug2]) =
                JsdConsistencyLoss::loss_and_grad([logits_clean, logits_aug1, logits_aug2]);

            let grad = Matrix::vstack(&[&(grad_ce + g_clean), &g_aug1, &g_aug2]);
            model.backward(&grad);
            StepOutput { loss: ce + js, cross_entropy: ce, consistency: Some(js), logits: logits_clean.clone() }
        }
        views => panic!("train_step expects 1 or 3 views, got {}", views.len()),
    };

    optimizer.step(model);
    scheduler.step(optimizer);
    output
}

/// One pass over `loader`. Returns the final exponential moving average of
/// the batch loss (decay 0.9, starting from 0).
pub fn train_epoch(
    model: &mut dyn Model,
    optimizer: &mut Optimizer,
    scheduler: &mut Scheduler,
    loader: &DataLoader,
    config: &TrainConfig,
    rng: &mut dyn RngCore,
) -> Result<f64> {
    let print_freq = config.print_freq.max(1);
    let mut loss_ema = 0.0;

    for (i, batch) in loader.iter(rng).enumerate() {
        let batch = batch?;
        let step = train_step(model, optimizer, scheduler, &batch);
        loss_ema = loss_ema * LOSS_EMA_DECAY + step.loss * (1.0 - LOSS_EMA_DECAY);

        if i % print_freq == 0 {
            info!(batch = i, loss_ema = %format!("{:.3}", loss_ema), "Train Loss");
        }
        debug!(
            batch = i,
            cross_entropy = step.cross_entropy,
            consistency = step.consistency,
            lr = optimizer.learning_rate(),
            "step"
        );
    }

    Ok(loss_ema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::registry::{ModelConfig, ModelRegistry};
    use crate::optim::optimizer::OptimizerKind;
    use crate::optim::scheduler::ScheduleKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(total_steps: usize) -> (Box<dyn Model>, Optimizer, Scheduler) {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let config = ModelConfig { input_dim: 4, num_classes: 3, hidden_size: 8 };
        let model = ModelRegistry::with_defaults().build("mlp", &config, &mut rng).unwrap();
        let mut opt = Optimizer::build(OptimizerKind::Sgd, 0.1, 0.9, 5e-4);
        let sched = Scheduler::new(ScheduleKind::Lambda, 0.1, total_steps);
        sched.apply(&mut opt);
        (model, opt, sched)
    }

    fn view(offset: f64) -> Matrix {
        Matrix::from_vec(2, 4, (0..8).map(|i| (i as f64 * 0.3 + offset).sin()).collect())
    }

    #[test]
    fn test_plain_step_advances_schedule() {
        let (mut model, mut opt, mut sched) = setup(10);
        let batch = Batch { views: vec![view(0.0)], targets: vec![0, 2] };
        let out = train_step(model.as_mut(), &mut opt, &mut sched, &batch);
        assert_eq!(out.logits.shape(), (2, 3));
        assert!(out.consistency.is_none());
        assert_eq!(out.loss, out.cross_entropy);
        assert_eq!(sched.current_step(), 1);
        assert!(opt.learning_rate() < 0.1);
    }

    #[test]
    fn test_consistency_step_decomposes() {
        let (mut model, mut opt, mut sched) = setup(10);
        let batch = Batch { views: vec![view(0.0), view(0.5), view(1.0)], targets: vec![1, 0] };
        let out = train_step(model.as_mut(), &mut opt, &mut sched, &batch);
        let js = out.consistency.unwrap();
        assert!(out.cross_entropy >= 0.0);
        assert!(js >= 0.0);
        assert!((out.loss - (out.cross_entropy + js)).abs() < 1e-12);
        assert_eq!(out.logits.shape(), (2, 3));
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let (mut model, mut opt, mut sched) = setup(1000);
        let batch = Batch { views: vec![view(0.0)], targets: vec![0, 2] };
        let first = train_step(model.as_mut(), &mut opt, &mut sched, &batch).loss;
        let mut last = first;
        for _ in 0..30 {
            last = train_step(model.as_mut(), &mut opt, &mut sched, &batch).loss;
        }
        assert!(last < first, "loss went from {} to {}", first, last);
    }
}
