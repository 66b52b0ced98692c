use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

use crate::math::matrix::Matrix;

/// Hidden-layer nonlinearities available to the model registry.
///
/// Output layers use `Identity`: models emit raw logits and the loss
/// functions apply (log-)softmax themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    Identity,
    Tanh,
    LeakyReLU { alpha: f64 },
    Gelu,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
        }
    }

    /// Derivative w.r.t. the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                let inner = c * (x + 0.044715 * x.powi(3));
                let tanh_inner = inner.tanh();
                let sech2 = 1.0 - tanh_inner * tanh_inner;
                let d_inner = c * (1.0 + 3.0 * 0.044715 * x.powi(2));
                0.5 * tanh_inner + 0.5 * x * sech2 * d_inner + 0.5
            }
        }
    }

    pub fn apply(&self, z: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Identity => z.clone(),
            _ => z.map(|x| self.function(x)),
        }
    }

    /// Backpropagates `grad` (∂L/∂a) through the activation: ∂L/∂z = grad ⊙ σ'(z).
    pub fn backward(&self, z: &Matrix, grad: &Matrix) -> Matrix {
        match self {
            ActivationFunction::Identity => grad.clone(),
            _ => grad.zip_map(z, |g, x| g * self.derivative(x)),
        }
    }

    /// ReLU-family activations get He init; the rest get Xavier.
    pub fn prefers_he_init(&self) -> bool {
        matches!(self, ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } | ActivationFunction::Gelu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-6;
        for act in [
            ActivationFunction::Tanh,
            ActivationFunction::Gelu,
            ActivationFunction::LeakyReLU { alpha: 0.1 },
        ] {
            for &x in &[-1.3, -0.2, 0.4, 2.1] {
                let numeric = (act.function(x + h) - act.function(x - h)) / (2.0 * h);
                assert!((numeric - act.derivative(x)).abs() < 1e-5, "{:?} at {}", act, x);
            }
        }
    }
}
