use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// A trainable tensor together with its accumulated gradient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Matrix,
    #[serde(skip)]
    pub grad: Matrix,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Matrix) -> Parameter {
        let grad = Matrix::zeros(value.rows, value.cols);
        Parameter { name: name.into(), value, grad }
    }

    pub fn zero_grad(&mut self) {
        if self.grad.shape() != self.value.shape() {
            self.grad = Matrix::zeros(self.value.rows, self.value.cols);
        } else {
            self.grad.fill(0.0);
        }
    }

    fn zero_grad_if_unset(&mut self) {
        if self.grad.shape() != self.value.shape() {
            self.grad = Matrix::zeros(self.value.rows, self.value.cols);
        }
    }

    pub fn len(&self) -> usize {
        self.value.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.data.is_empty()
    }
}

/// Fully connected layer `a = σ(x·W + b)` over a batch of row vectors.
#[derive(Debug)]
pub struct Layer {
    pub size: usize,
    pub weights: Parameter,
    pub biases: Parameter,
    pub activator: ActivationFunction,
    inputs: Option<Matrix>,
    pre_activation: Option<Matrix>, // z = xW + b, needed for σ'(z)
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = if activation.prefers_he_init() {
            Matrix::he(input_size, size, rng)
        } else {
            Matrix::xavier(input_size, size, rng)
        };
        Layer {
            size,
            weights: Parameter::new(format!("{}.weight", name), weights),
            biases: Parameter::new(format!("{}.bias", name), Matrix::zeros(1, size)),
            activator: activation,
            inputs: None,
            pre_activation: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.value.rows
    }

    /// Training-mode forward pass; caches what `backward` needs.
    pub fn forward(&mut self, input: &Matrix) -> Matrix {
        let z = self.linear(input);
        let a = self.activator.apply(&z);
        self.inputs = Some(input.clone());
        self.pre_activation = Some(z);
        a
    }

    /// Inference-only forward pass; leaves the layer untouched.
    pub fn predict(&self, input: &Matrix) -> Matrix {
        self.activator.apply(&self.linear(input))
    }

    fn linear(&self, input: &Matrix) -> Matrix {
        (input * &self.weights.value).add_row_broadcast(&self.biases.value)
    }

    /// Accumulates ∂L/∂W and ∂L/∂b from `grad_output` (∂L/∂a for this layer)
    /// and returns ∂L/∂x for the layer below.
    ///
    /// # Panics
    /// Panics if called without a preceding `forward`.
    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        let z = self.pre_activation.as_ref().expect("backward called before forward");
        let inputs = self.inputs.as_ref().expect("backward called before forward");

        // δ = ∂L/∂a ⊙ σ'(z)
        let delta = self.activator.backward(z, grad_output);

        let w_grad = &inputs.transpose() * &delta;
        let b_grad = delta.sum_rows();
        self.weights.zero_grad_if_unset();
        self.biases.zero_grad_if_unset();
        self.weights.grad.add_assign(&w_grad);
        self.biases.grad.add_assign(&b_grad);

        &delta * &self.weights.value.transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_backward_matches_finite_differences() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut layer = Layer::new("fc", 3, 4, ActivationFunction::Tanh, &mut rng);
        let x = Matrix::from_vec(2, 4, vec![0.1, -0.2, 0.3, 0.5, -0.7, 0.2, 0.0, 0.9]);

        // L = sum(a)
        let out = layer.forward(&x);
        let ones = Matrix::from_vec(out.rows, out.cols, vec![1.0; out.data.len()]);
        layer.backward(&ones);

        let h = 1e-6;
        for idx in [0, 5, 11] {
            let original = layer.weights.value.data[idx];
            layer.weights.value.data[idx] = original + h;
            let plus: f64 = layer.predict(&x).data.iter().sum();
            layer.weights.value.data[idx] = original - h;
            let minus: f64 = layer.predict(&x).data.iter().sum();
            layer.weights.value.data[idx] = original;
            let numeric = (plus - minus) / (2.0 * h);
            assert!((numeric - layer.weights.grad.data[idx]).abs() < 1e-6);
        }
    }
}
