use serde::{Deserialize, Serialize};

use crate::{math::matrix::Matrix, layers::dense::Parameter};

/// Stochastic gradient descent with optional (Nesterov) momentum and L2
/// weight decay, using the PyTorch update rule:
///
///   g   = grad + wd · w
///   buf = g                      (first step)
///   buf = μ · buf + g            (afterwards)
///   g   = g + μ · buf  (Nesterov)  or  buf
///   w  -= lr · g
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub nesterov: bool,
    momentum_buffers: Vec<Option<Matrix>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd::with_momentum(learning_rate, 0.0, 0.0, false)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64, weight_decay: f64, nesterov: bool) -> Sgd {
        Sgd {
            learning_rate,
            momentum,
            weight_decay,
            nesterov,
            momentum_buffers: Vec::new(),
        }
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.momentum_buffers.len()
    }

    /// Applies one update to every parameter given its accumulated gradient.
    pub fn step(&mut self, params: &mut [&mut Parameter]) {
        if self.momentum_buffers.len() != params.len() {
            self.momentum_buffers.resize(params.len(), None);
        }

        for (param, buffer) in params.iter_mut().zip(self.momentum_buffers.iter_mut()) {
            let mut grad = if self.weight_decay != 0.0 {
                let wd = self.weight_decay;
                param.grad.zip_map(&param.value, |g, w| g + wd * w)
            } else {
                param.grad.clone()
            };

            if self.momentum != 0.0 {
                let mu = self.momentum;
                let buf = match buffer.take() {
                    None => grad.clone(),
                    Some(prev) => prev.zip_map(&grad, |b, g| mu * b + g),
                };
                grad = if self.nesterov {
                    grad.zip_map(&buf, |g, b| g + mu * b)
                } else {
                    buf.clone()
                };
                *buffer = Some(buf);
            }

            let lr = self.learning_rate;
            for (w, g) in param.value.data.iter_mut().zip(&grad.data) {
                *w -= lr * g;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_step() {
        let mut p = Parameter::new("w", Matrix::from_vec(1, 2, vec![1.0, -1.0]));
        p.grad = Matrix::from_vec(1, 2, vec![0.5, 0.5]);
        let mut sgd = Sgd::new(0.1);
        sgd.step(&mut [&mut p]);
        assert!((p.value.data[0] - 0.95).abs() < 1e-12);
        assert!((p.value.data[1] + 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_nesterov_momentum_two_steps() {
        let mut p = Parameter::new("w", Matrix::from_vec(1, 1, vec![0.0]));
        let mut sgd = Sgd::with_momentum(1.0, 0.9, 0.0, true);

        p.grad = Matrix::from_vec(1, 1, vec![1.0]);
        sgd.step(&mut [&mut p]);
        // buf = 1, g = 1 + 0.9 = 1.9
        assert!((p.value.data[0] + 1.9).abs() < 1e-12);

        sgd.step(&mut [&mut p]);
        // buf = 0.9 + 1 = 1.9, g = 1 + 0.9 * 1.9 = 2.71
        assert!((p.value.data[0] + 1.9 + 2.71).abs() < 1e-12);
    }
}
