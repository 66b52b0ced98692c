use serde::{Deserialize, Serialize};

use crate::{math::matrix::Matrix, layers::dense::Parameter};

/// Adam with decoupled weight decay (Loshchilov & Hutter), PyTorch defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamW {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    step: u64,
    exp_avg: Vec<Matrix>,
    exp_avg_sq: Vec<Matrix>,
}

impl AdamW {
    pub fn new(learning_rate: f64) -> AdamW {
        AdamW {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.01,
            step: 0,
            exp_avg: Vec::new(),
            exp_avg_sq: Vec::new(),
        }
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.exp_avg.len()
    }

    pub fn step(&mut self, params: &mut [&mut Parameter]) {
        if self.exp_avg.len() != params.len() {
            self.exp_avg = params.iter().map(|p| Matrix::zeros(p.value.rows, p.value.cols)).collect();
            self.exp_avg_sq = self.exp_avg.clone();
        }
        self.step += 1;

        let (b1, b2) = (self.beta1, self.beta2);
        let bias1 = 1.0 - b1.powi(self.step as i32);
        let bias2 = 1.0 - b2.powi(self.step as i32);
        let step_size = self.learning_rate / bias1;
        let decay = 1.0 - self.learning_rate * self.weight_decay;

        for ((param, m), v) in params.iter_mut().zip(&mut self.exp_avg).zip(&mut self.exp_avg_sq) {
            let grad = &param.grad.data;
            let w = &mut param.value.data;
            for i in 0..w.len() {
                w[i] *= decay;
                m.data[i] = b1 * m.data[i] + (1.0 - b1) * grad[i];
                v.data[i] = b2 * v.data[i] + (1.0 - b2) * grad[i] * grad[i];
                let denom = (v.data[i] / bias2).sqrt() + self.eps;
                w[i] -= step_size * m.data[i] / denom;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        // With bias correction the first Adam step is lr * sign(grad).
        let mut p = Parameter::new("w", Matrix::from_vec(1, 2, vec![0.0, 0.0]));
        p.grad = Matrix::from_vec(1, 2, vec![3.0, -0.2]);
        let mut opt = AdamW::new(0.01);
        opt.step(&mut [&mut p]);
        assert!((p.value.data[0] + 0.01).abs() < 1e-6);
        assert!((p.value.data[1] - 0.01).abs() < 1e-6);
        assert_eq!(opt.steps_taken(), 1);
    }
}
