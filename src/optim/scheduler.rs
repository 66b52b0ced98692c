use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::optim::optimizer::Optimizer;

/// Final learning rate of the lambda schedule. The cosine schedule uses the
/// ratio `LR_FLOOR / base_lr` as its absolute minimum.
pub const LR_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Multiplier `get_lr(step, total, 1, 1e-6 / base_lr)`.
    Lambda,
    /// Cosine annealing with `T_max = total` and `eta_min = 1e-6 / base_lr`.
    CosineAnnealing,
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "lambda" => Ok(ScheduleKind::Lambda),
            "cosineannealing" => Ok(ScheduleKind::CosineAnnealing),
            other => Err(format!("unknown scheduler '{}' (expected lambda or cosineannealing)", other)),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Lambda => write!(f, "lambda"),
            ScheduleKind::CosineAnnealing => write!(f, "cosineannealing"),
        }
    }
}

/// Cosine curve from `lr_max` at step 0 to `lr_min` at `total_steps`.
pub fn get_lr(step: usize, total_steps: usize, lr_max: f64, lr_min: f64) -> f64 {
    lr_min + (lr_max - lr_min) * 0.5 * (1.0 + (step as f64 / total_steps as f64 * PI).cos())
}

/// Position within the schedule; saved in checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub step: usize,
}

/// Per-batch learning-rate schedule. `total_steps` is passed in explicitly
/// (epochs × batches per epoch).
#[derive(Debug, Clone)]
pub struct Scheduler {
    kind: ScheduleKind,
    base_lr: f64,
    total_steps: usize,
    step: usize,
}

impl Scheduler {
    pub fn new(kind: ScheduleKind, base_lr: f64, total_steps: usize) -> Scheduler {
        Scheduler { kind, base_lr, total_steps: total_steps.max(1), step: 0 }
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Factor applied to the base learning rate at `step`.
    pub fn multiplier_at(&self, step: usize) -> f64 {
        match self.kind {
            ScheduleKind::Lambda => get_lr(step, self.total_steps, 1.0, LR_FLOOR / self.base_lr),
            ScheduleKind::CosineAnnealing => self.learning_rate_at(step) / self.base_lr,
        }
    }

    pub fn learning_rate_at(&self, step: usize) -> f64 {
        match self.kind {
            ScheduleKind::Lambda => self.base_lr * self.multiplier_at(step),
            ScheduleKind::CosineAnnealing => {
                let eta_min = LR_FLOOR / self.base_lr;
                get_lr(step, self.total_steps, self.base_lr, eta_min)
            }
        }
    }

    /// Writes the current step's learning rate into the optimizer.
    pub fn apply(&self, optimizer: &mut Optimizer) {
        optimizer.set_learning_rate(self.learning_rate_at(self.step));
    }

    /// Advances one batch and updates the optimizer's learning rate.
    pub fn step(&mut self, optimizer: &mut Optimizer) {
        self.step += 1;
        self.apply(optimizer);
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState { step: self.step }
    }

    pub fn load_state(&mut self, state: SchedulerState) {
        self.step = state.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::optimizer::OptimizerKind;

    #[test]
    fn test_get_lr_endpoints() {
        assert_eq!(get_lr(0, 100, 1.0, 0.0), 1.0);
        assert!((get_lr(100, 100, 1.0, 1e-5) - 1e-5).abs() < 1e-15);
        assert!((get_lr(50, 100, 1.0, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lambda_schedule_reaches_floor() {
        let s = Scheduler::new(ScheduleKind::Lambda, 0.1, 1000);
        assert!((s.learning_rate_at(0) - 0.1).abs() < 1e-15);
        assert!((s.learning_rate_at(1000) - LR_FLOOR).abs() < 1e-15);
    }

    #[test]
    fn test_step_updates_optimizer() {
        let mut opt = Optimizer::build(OptimizerKind::Sgd, 0.1, 0.9, 0.0);
        let mut s = Scheduler::new(ScheduleKind::CosineAnnealing, 0.1, 10);
        s.apply(&mut opt);
        assert!((opt.learning_rate() - 0.1).abs() < 1e-12);
        for _ in 0..5 {
            s.step(&mut opt);
        }
        assert_eq!(s.current_step(), 5);
        assert!(opt.learning_rate() < 0.1);
        assert!(opt.learning_rate() > 0.0);
    }

    #[test]
    fn test_kind_parsing_accepts_hyphenated() {
        assert_eq!("cosine-annealing".parse::<ScheduleKind>().unwrap(), ScheduleKind::CosineAnnealing);
        assert_eq!("lambda".parse::<ScheduleKind>().unwrap(), ScheduleKind::Lambda);
    }
}
