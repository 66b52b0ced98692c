//! `augmix` command line: trains a classifier on CIFAR-10/100 with AugMix and
//! reports clean, corruption and perturbation robustness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use augmix::data::cifar::DatasetKind;
use augmix::optim::optimizer::OptimizerKind;
use augmix::optim::scheduler::ScheduleKind;
use augmix::run::{run, RunConfig, RunContext};

/// Trains a dense classifier on CIFAR-10/100 with AugMix.
#[derive(Parser, Debug)]
#[command(name = "augmix")]
#[command(version)]
#[command(about = "AugMix training and CIFAR-C / CIFAR-P evaluation", long_about = None)]
struct Cli {
    /// Dataset: cifar10 or cifar100
    #[arg(long, default_value = "cifar10")]
    dataset: DatasetKind,

    /// Model architecture (linear, mlp, wide_mlp, deep_mlp)
    #[arg(short, long, default_value = "mlp")]
    model: String,

    /// Optimizer: sgd or adamW
    #[arg(short, long, default_value = "sgd")]
    optimizer: OptimizerKind,

    /// Learning-rate schedule: lambda or cosineannealing
    #[arg(short, long, default_value = "lambda")]
    scheduler: ScheduleKind,

    #[arg(short, long, default_value_t = 100)]
    epochs: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    #[arg(short, long, default_value_t = 128)]
    batch_size: usize,

    #[arg(long, default_value_t = 1000)]
    eval_batch_size: usize,

    #[arg(long, default_value_t = 0.9)]
    momentum: f64,

    /// Weight decay
    #[arg(long, default_value_t = 0.0005)]
    decay: f64,

    /// Number of augmentation chains mixed per image
    #[arg(long, default_value_t = 3)]
    mixture_width: usize,

    /// Depth of each chain; -1 draws a depth in [1, 3]
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    mixture_depth: i64,

    /// Severity of the base augmentation operators (1-10)
    #[arg(long, default_value_t = 3)]
    aug_severity: u32,

    /// Train on a single augmented view without the consistency loss
    #[arg(long)]
    no_jsd: bool,

    /// Also use brightness, color, contrast and sharpness operators
    #[arg(long)]
    all_ops: bool,

    /// Directory for checkpoints, run config and the CSV log
    #[arg(short = 'S', long, default_value = "./snapshots")]
    save: PathBuf,

    /// Checkpoint to resume from
    #[arg(short, long)]
    resume: Option<PathBuf>,

    /// Only evaluate the (resumed) model
    #[arg(long)]
    evaluate: bool,

    /// Training loss is logged every this many batches
    #[arg(long, default_value_t = 50)]
    print_freq: usize,

    /// Data loader threads; 0 loads on the training thread
    #[arg(long, default_value_t = 4)]
    num_workers: usize,

    /// Directory holding the CIFAR binary archives
    #[arg(long, default_value = "./data/cifar")]
    data_dir: PathBuf,

    /// CIFAR-C directory (defaults to <data-dir>/CIFAR-10-C or CIFAR-100-C)
    #[arg(long)]
    corruption_dir: Option<PathBuf>,

    /// CIFAR-10-P directory (defaults to <data-dir>/CIFAR-10-P)
    #[arg(long)]
    perturbation_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Hidden width of the dense models
    #[arg(long, default_value_t = 256)]
    hidden_size: usize,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            dataset: self.dataset,
            model: self.model,
            optimizer: self.optimizer,
            scheduler: self.scheduler,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            eval_batch_size: self.eval_batch_size,
            momentum: self.momentum,
            decay: self.decay,
            mixture_width: self.mixture_width,
            mixture_depth: self.mixture_depth,
            aug_severity: self.aug_severity,
            no_jsd: self.no_jsd,
            all_ops: self.all_ops,
            save: self.save,
            resume: self.resume,
            evaluate: self.evaluate,
            print_freq: self.print_freq,
            num_workers: self.num_workers,
            data_dir: self.data_dir,
            corruption_dir: self.corruption_dir,
            perturbation_dir: self.perturbation_dir,
            seed: self.seed,
            hidden_size: self.hidden_size,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Cli::parse().into_config();
    let result = RunContext::new(config).and_then(|mut ctx| run(&mut ctx));
    match result {
        Ok(summary) => {
            info!(
                best_acc = %format!("{:.4}", summary.best_acc),
                test_c_acc = %format!("{:.4}", summary.test_c_acc),
                "Run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
