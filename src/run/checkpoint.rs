use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::cifar::DatasetKind;
use crate::error::{AugMixError, Result};
use crate::network::model::{Model, StateDict};
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::{Scheduler, SchedulerState};

pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const BEST_CHECKPOINT_FILE: &str = "model_best.json";

/// Everything needed to continue a run after `epoch` finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 0-based index of the epoch that produced this checkpoint.
    pub epoch: usize,
    pub dataset: DatasetKind,
    pub model: String,
    pub state_dict: StateDict,
    pub best_acc: f64,
    pub optimizer: Optimizer,
    pub scheduler: SchedulerState,
}

/// Where a resumed run picks up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumePoint {
    pub start_epoch: usize,
    pub best_acc: f64,
}

impl Checkpoint {
    pub fn capture(
        epoch: usize,
        dataset: DatasetKind,
        model: &dyn Model,
        best_acc: f64,
        optimizer: &Optimizer,
        scheduler: &Scheduler,
    ) -> Checkpoint {
        Checkpoint {
            epoch,
            dataset,
            model: model.name().to_string(),
            state_dict: model.state_dict(),
            best_acc,
            optimizer: optimizer.state(),
            scheduler: scheduler.state(),
        }
    }

    pub fn next_epoch(&self) -> usize {
        self.epoch + 1
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path).map_err(|e| AugMixError::file(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// A missing or unreadable file is an error; there is no partial resume.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let file = fs::File::open(path).map_err(|e| AugMixError::file(path, e))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| AugMixError::Checkpoint(format!("{}: {}", path.display(), e)))
    }

    /// Loads weights, optimizer and schedule position into the live run.
    pub fn restore(
        self,
        model: &mut dyn Model,
        optimizer: &mut Optimizer,
        scheduler: &mut Scheduler,
    ) -> Result<ResumePoint> {
        if self.model != model.name() {
            return Err(AugMixError::Checkpoint(format!(
                "checkpoint is for model '{}', run uses '{}'",
                self.model,
                model.name()
            )));
        }
        let resume = ResumePoint { start_epoch: self.next_epoch(), best_acc: self.best_acc };
        model.load_state_dict(&self.state_dict)?;
        optimizer.load_state(self.optimizer, model)?;
        scheduler.load_state(self.scheduler);
        scheduler.apply(optimizer);
        Ok(resume)
    }
}

/// Writes `checkpoint.json` in `save_dir`, and copies it to
/// `model_best.json` when `is_best`. Returns the checkpoint path.
pub fn save_checkpoint(checkpoint: &Checkpoint, save_dir: &Path, is_best: bool) -> Result<PathBuf> {
    let path = save_dir.join(CHECKPOINT_FILE);
    checkpoint.save_json(&path)?;
    if is_best {
        let best = save_dir.join(BEST_CHECKPOINT_FILE);
        fs::copy(&path, &best).map_err(|e| AugMixError::file(&best, e))?;
    }
    Ok(path)
}
