use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AugMixError, Result};
use crate::network::model::Model;
use crate::optim::adamw::AdamW;
use crate::optim::sgd::Sgd;

/// Which optimizer a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    AdamW,
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adamw" => Ok(OptimizerKind::AdamW),
            other => Err(format!("unknown optimizer '{}' (expected sgd or adamW)", other)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::AdamW => write!(f, "adamW"),
        }
    }
}

/// The run's optimizer. The whole value, buffers included, is its
/// serializable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Optimizer {
    Sgd(Sgd),
    AdamW(AdamW),
}

impl Optimizer {
    /// SGD is Nesterov with the configured momentum and decay; AdamW keeps its
    /// own default decay.
    pub fn build(kind: OptimizerKind, learning_rate: f64, momentum: f64, weight_decay: f64) -> Optimizer {
        match kind {
            OptimizerKind::Sgd => Optimizer::Sgd(Sgd::with_momentum(learning_rate, momentum, weight_decay, true)),
            OptimizerKind::AdamW => Optimizer::AdamW(AdamW::new(learning_rate)),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Sgd(_) => OptimizerKind::Sgd,
            Optimizer::AdamW(_) => OptimizerKind::AdamW,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Optimizer::Sgd(o) => o.learning_rate,
            Optimizer::AdamW(o) => o.learning_rate,
        }
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Optimizer::Sgd(o) => o.learning_rate = lr,
            Optimizer::AdamW(o) => o.learning_rate = lr,
        }
    }

    pub fn zero_grad(&self, model: &mut dyn Model) {
        model.zero_grad();
    }

    pub fn step(&mut self, model: &mut dyn Model) {
        let mut params = model.parameters_mut();
        match self {
            Optimizer::Sgd(o) => o.step(&mut params),
            Optimizer::AdamW(o) => o.step(&mut params),
        }
    }

    pub fn state(&self) -> Optimizer {
        self.clone()
    }

    /// Replaces this optimizer's state with a saved one of the same kind.
    pub fn load_state(&mut self, state: Optimizer, model: &dyn Model) -> Result<()> {
        if state.kind() != self.kind() {
            return Err(AugMixError::StateMismatch(format!(
                "checkpoint optimizer is {}, run uses {}",
                state.kind(),
                self.kind()
            )));
        }
        let buffers = match &state {
            Optimizer::Sgd(o) => o.buffer_count(),
            Optimizer::AdamW(o) => o.buffer_count(),
        };
        let params = model.parameters().len();
        if buffers != 0 && buffers != params {
            return Err(AugMixError::StateMismatch(format!(
                "optimizer state holds {} buffers, model has {} parameters",
                buffers, params
            )));
        }
        *self = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("sgd".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert_eq!("adamW".parse::<OptimizerKind>().unwrap(), OptimizerKind::AdamW);
        assert!("rmsprop".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn test_learning_rate_is_settable() {
        let mut opt = Optimizer::build(OptimizerKind::Sgd, 0.1, 0.9, 5e-4);
        opt.set_learning_rate(0.05);
        assert_eq!(opt.learning_rate(), 0.05);
    }
}
