use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AugMixError, Result};
use crate::layers::dense::Parameter;
use crate::math::matrix::Matrix;

/// Named parameter tensors; the opaque blob a checkpoint persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, Matrix>,
}

impl StateDict {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// A classifier mapping a batch of flattened images (one per row) to a batch
/// of class logits.
///
/// `forward` is the training path: it caches activations so a following
/// `backward` can accumulate parameter gradients. `predict` is the read-only
/// evaluation path.
pub trait Model: Send {
    /// Registry name of the architecture.
    fn name(&self) -> &str;

    /// Flattened input size each row of a batch must have.
    fn input_dim(&self) -> usize;

    fn num_classes(&self) -> usize;

    fn forward(&mut self, input: &Matrix) -> Matrix;

    fn predict(&self, input: &Matrix) -> Matrix;

    /// Accumulates gradients given ∂L/∂logits for the last `forward` batch.
    fn backward(&mut self, grad_logits: &Matrix);

    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    fn state_dict(&self) -> StateDict {
        let tensors = self.parameters()
            .into_iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        StateDict { tensors }
    }

    /// Restores parameters by name. Every parameter must be present with a
    /// matching shape; extra entries are rejected too.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let mut params = self.parameters_mut();
        if params.len() != state.len() {
            return Err(AugMixError::StateMismatch(format!(
                "model has {} parameters, state dict has {}",
                params.len(),
                state.len()
            )));
        }
        for p in params.iter_mut() {
            let value = state.tensors.get(&p.name).ok_or_else(|| {
                AugMixError::StateMismatch(format!("missing parameter '{}'", p.name))
            })?;
            if value.shape() != p.value.shape() {
                return Err(AugMixError::StateMismatch(format!(
                    "parameter '{}' has shape {:?}, state dict has {:?}",
                    p.name,
                    p.value.shape(),
                    value.shape()
                )));
            }
            p.value = value.clone();
            p.zero_grad();
        }
        Ok(())
    }
}
