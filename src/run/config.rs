use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::augment::mix::AugMixConfig;
use crate::augment::ops::Severity;
use crate::data::cifar::DatasetKind;
use crate::error::{AugMixError, Result};
use crate::optim::optimizer::OptimizerKind;
use crate::optim::scheduler::ScheduleKind;
use crate::train::train_config::TrainConfig;

/// Everything a run needs, as parsed from the command line. Saved next to
/// the checkpoints as `run_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: DatasetKind,
    pub model: String,
    pub optimizer: OptimizerKind,
    pub scheduler: ScheduleKind,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub eval_batch_size: usize,
    pub momentum: f64,
    pub decay: f64,
    pub mixture_width: usize,
    /// Fixed chain depth; zero or negative draws a depth in `[1, 3]`.
    pub mixture_depth: i64,
    pub aug_severity: u32,
    pub no_jsd: bool,
    pub all_ops: bool,
    pub save: PathBuf,
    pub resume: Option<PathBuf>,
    pub evaluate: bool,
    pub print_freq: usize,
    pub num_workers: usize,
    pub data_dir: PathBuf,
    pub corruption_dir: Option<PathBuf>,
    pub perturbation_dir: Option<PathBuf>,
    pub seed: u64,
    pub hidden_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            dataset: DatasetKind::Cifar10,
            model: "mlp".to_string(),
            optimizer: OptimizerKind::Sgd,
            scheduler: ScheduleKind::Lambda,
            epochs: 100,
            learning_rate: 0.1,
            batch_size: 128,
            eval_batch_size: 1000,
            momentum: 0.9,
            decay: 0.0005,
            mixture_width: 3,
            mixture_depth: -1,
            aug_severity: 3,
            no_jsd: false,
            all_ops: false,
            save: PathBuf::from("./snapshots"),
            resume: None,
            evaluate: false,
            print_freq: 50,
            num_workers: 4,
            data_dir: PathBuf::from("./data/cifar"),
            corruption_dir: None,
            perturbation_dir: None,
            seed: 1,
            hidden_size: 256,
        }
    }
}

impl RunConfig {
    /// Checks value ranges. Filesystem preconditions are checked when the
    /// run's outputs are opened.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("epochs", self.epochs),
            ("batch size", self.batch_size),
            ("eval batch size", self.eval_batch_size),
            ("hidden size", self.hidden_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AugMixError::Config(format!("{} must be at least 1", name)));
            }
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(AugMixError::Config(format!("learning rate must be positive, got {}", self.learning_rate)));
        }
        if self.momentum < 0.0 || self.decay < 0.0 {
            return Err(AugMixError::Config("momentum and decay must be non-negative".to_string()));
        }
        self.augmix_config()?.validate()
    }

    pub fn augmix_config(&self) -> Result<AugMixConfig> {
        Ok(AugMixConfig {
            mixture_width: self.mixture_width,
            mixture_depth: usize::try_from(self.mixture_depth).ok().filter(|d| *d > 0),
            severity: Severity::new(self.aug_severity)?,
            all_ops: self.all_ops,
        })
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            eval_batch_size: self.eval_batch_size,
            consistency: !self.no_jsd,
            print_freq: self.print_freq,
            num_workers: self.num_workers,
        }
    }

    pub fn corruption_path(&self) -> PathBuf {
        self.corruption_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(self.dataset.corruption_dir()))
    }

    /// Perturbation sequences exist for CIFAR-10 only.
    pub fn perturbation_path(&self) -> PathBuf {
        self.perturbation_dir.clone().unwrap_or_else(|| self.data_dir.join("CIFAR-10-P"))
    }

    /// `{save}/{dataset}_{model}_training_log.csv`
    pub fn log_path(&self) -> PathBuf {
        self.save.join(format!("{}_{}_training_log.csv", self.dataset, self.model))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| AugMixError::file(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<RunConfig> {
        let file = std::fs::File::open(path).map_err(|e| AugMixError::file(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.augmix_config().unwrap().mixture_depth, None);
        assert!(config.train_config().consistency);
        assert_eq!(config.log_path(), PathBuf::from("./snapshots/cifar10_mlp_training_log.csv"));
        assert_eq!(config.corruption_path(), PathBuf::from("./data/cifar/CIFAR-10-C"));
    }

    #[test]
    fn test_fixed_depth_and_bad_severity() {
        let config = RunConfig { mixture_depth: 2, ..RunConfig::default() };
        assert_eq!(config.augmix_config().unwrap().mixture_depth, Some(2));
        let config = RunConfig { mixture_depth: 0, ..RunConfig::default() };
        assert_eq!(config.augmix_config().unwrap().mixture_depth, None);
        let config = RunConfig { aug_severity: 11, ..RunConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_width_rejected() {
        let config = RunConfig { mixture_width: 0, ..RunConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_config.json");
        let config = RunConfig { dataset: DatasetKind::Cifar100, resume: Some("ck.json".into()), ..RunConfig::default() };
        config.save_json(&path).unwrap();
        assert_eq!(RunConfig::load_json(&path).unwrap(), config);
    }
}
