use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::augment::mix::AugMix;
use crate::augment::preprocess::{Normalize, Preprocess};
use crate::data::adapter::AugMixDataset;
use crate::data::array::ArrayDataset;
use crate::data::cifar::{load_cifar, DatasetKind, Split};
use crate::data::loader::DataLoader;
use crate::data::transform::RandomCropFlip;
use crate::error::Result;
use crate::eval::clean::{test, EvalSettings};
use crate::eval::corruption::test_c;
use crate::eval::perturbation::test_p;
use crate::network::registry::{ModelConfig, ModelRegistry};
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::Scheduler;
use crate::run::checkpoint::{save_checkpoint, Checkpoint};
use crate::run::context::RunContext;
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_fn::train_epoch;

/// Final numbers of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// First epoch this process trained (after any resume).
    pub start_epoch: usize,
    pub epochs_trained: usize,
    pub best_acc: f64,
    pub test_loss: f64,
    pub test_acc: f64,
    pub test_c_acc: f64,
    /// Mean flip probability; CIFAR-10 training runs only.
    pub test_p_flip: Option<f64>,
}

/// Loads CIFAR from `config.data_dir` and runs training or evaluation.
pub fn run(ctx: &mut RunContext) -> Result<RunSummary> {
    let kind = ctx.config.dataset;
    let train_data = load_cifar(kind, &ctx.config.data_dir, Split::Train)?.with_transform(RandomCropFlip::cifar());
    let test_data = load_cifar(kind, &ctx.config.data_dir, Split::Test)?;
    run_with_data(ctx, train_data, test_data)
}

/// Runs on already loaded data. `train_data` should carry its train-time
/// transform; `test_data` should not.
///
/// With `evaluate` set this only reports clean and corruption accuracy.
/// Otherwise it trains from epoch 0 (or the resumed epoch), checkpointing
/// every epoch, then evaluates corruptions and, for CIFAR-10, perturbations.
pub fn run_with_data(ctx: &mut RunContext, train_data: ArrayDataset, test_data: ArrayDataset) -> Result<RunSummary> {
    let config = ctx.config.clone();
    let train_config = config.train_config();

    let preprocess: Arc<dyn Preprocess> = Arc::new(Normalize::default());
    let engine = Arc::new(AugMix::new(config.augmix_config()?, Arc::clone(&preprocess))?);
    let train_set = AugMixDataset::new(train_data, engine, train_config.consistency);
    let train_loader = DataLoader::new(Arc::new(train_set), config.batch_size)
        .shuffle(true)
        .num_workers(config.num_workers);

    let eval = EvalSettings::new(config.eval_batch_size, config.num_workers, preprocess);
    let test_loader = eval.loader(test_data.clone());

    let (height, width) = test_data.image_shape();
    let model_config = ModelConfig {
        input_dim: 3 * height * width,
        num_classes: config.dataset.num_classes(),
        hidden_size: config.hidden_size,
    };
    let mut model = ModelRegistry::with_defaults().build(&config.model, &model_config, ctx.rng())?;
    info!(model = %config.model, parameters = model.num_parameters(), "Model built");

    let mut optimizer = Optimizer::build(config.optimizer, config.learning_rate, config.momentum, config.decay);
    let total_steps = config.epochs * train_loader.len();
    let mut scheduler = Scheduler::new(config.scheduler, config.learning_rate, total_steps);
    scheduler.apply(&mut optimizer);

    let mut start_epoch = 0;
    let mut best_acc = 0.0;
    if let Some(path) = &config.resume {
        let resume = Checkpoint::load_json(path)?.restore(model.as_mut(), &mut optimizer, &mut scheduler)?;
        start_epoch = resume.start_epoch;
        best_acc = resume.best_acc;
        info!(start_epoch, best_acc, "Model restored");
    }

    if config.evaluate {
        // Clean first, then corruptions.
        let (test_loss, test_acc) = test(model.as_ref(), &test_loader)?;
        info!(
            test_loss = %format!("{:.3}", test_loss),
            test_error = %format!("{:.2}", 100.0 - 100.0 * test_acc),
            "Clean"
        );
        let test_c_acc = test_c(model.as_ref(), &test_data, &config.corruption_path(), &eval)?;
        info!(mean_corruption_error = %format!("{:.3}", 100.0 - 100.0 * test_c_acc), "Corruption evaluation done");
        return Ok(RunSummary {
            start_epoch,
            epochs_trained: 0,
            best_acc,
            test_loss,
            test_acc,
            test_c_acc,
            test_p_flip: None,
        });
    }

    ctx.prepare_outputs(config.resume.is_some())?;

    info!(epoch = start_epoch + 1, "Beginning training");
    let (mut test_loss, mut test_acc) = (0.0, 0.0);
    for epoch in start_epoch..config.epochs {
        let begin = Instant::now();

        let train_loss = train_epoch(
            model.as_mut(),
            &mut optimizer,
            &mut scheduler,
            &train_loader,
            &train_config,
            ctx.rng(),
        )?;
        (test_loss, test_acc) = test(model.as_ref(), &test_loader)?;

        let is_best = test_acc > best_acc;
        best_acc = f64::max(best_acc, test_acc);
        let checkpoint = Checkpoint::capture(epoch, config.dataset, model.as_ref(), best_acc, &optimizer, &scheduler);
        save_checkpoint(&checkpoint, ctx.save_dir(), is_best)?;

        let stats = EpochStats { epoch, elapsed_secs: begin.elapsed().as_secs(), train_loss, test_loss, test_acc };
        ctx.run_log()?.append_epoch(&stats)?;
        info!("{}", stats);
    }

    let test_c_acc = test_c(model.as_ref(), &test_data, &config.corruption_path(), &eval)?;
    info!(mean_corruption_error = %format!("{:.3}", 100.0 - 100.0 * test_c_acc), "Corruption evaluation done");

    let test_p_flip = if config.dataset == DatasetKind::Cifar10 {
        let flip = test_p(model.as_ref(), &config.perturbation_path(), config.eval_batch_size)?;
        info!(mean_flipping_rate = %format!("{:.3}", flip), "Perturbation evaluation done");
        Some(flip)
    } else {
        None
    };

    ctx.run_log()?.append_summary(config.epochs, test_c_acc)?;

    Ok(RunSummary {
        start_epoch,
        epochs_trained: config.epochs.saturating_sub(start_epoch),
        best_acc,
        test_loss,
        test_acc,
        test_c_acc,
        test_p_flip,
    })
}
