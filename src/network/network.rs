use rand::RngCore;

use crate::layers::dense::{Layer, Parameter};
use crate::math::matrix::Matrix;
use crate::network::model::Model;
use crate::network::spec::NetworkSpec;

/// A feed-forward stack of dense layers emitting logits.
pub struct Network {
    name: String,
    pub layers: Vec<Layer>,
}

impl Network {
    /// Builds and initialises a network from its spec.
    pub fn from_spec(spec: &NetworkSpec, rng: &mut dyn RngCore) -> Network {
        let layers = spec.layers.iter()
            .enumerate()
            .map(|(i, l)| Layer::new(&format!("layers.{}", i), l.size, l.input_size, l.activation, &mut *rng))
            .collect();
        Network { name: spec.name.clone(), layers }
    }
}

impl Model for Network {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    fn num_classes(&self) -> usize {
        self.layers.last().map(|l| l.size).unwrap_or(0)
    }

    fn forward(&mut self, input: &Matrix) -> Matrix {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current);
        }
        current
    }

    fn predict(&self, input: &Matrix) -> Matrix {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.predict(&current);
        }
        current
    }

    fn backward(&mut self, grad_logits: &Matrix) {
        let mut delta = grad_logits.clone();
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(|l| [&l.weights, &l.biases]).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.iter_mut().flat_map(|l| [&mut l.weights, &mut l.biases]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::LayerSpec;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tiny_spec() -> NetworkSpec {
        NetworkSpec {
            name: "tiny".to_string(),
            layers: vec![
                LayerSpec { size: 5, input_size: 4, activation: ActivationFunction::ReLU },
                LayerSpec { size: 3, input_size: 5, activation: ActivationFunction::Identity },
            ],
        }
    }

    #[test]
    fn test_forward_and_predict_agree() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut net = Network::from_spec(&tiny_spec(), &mut rng);
        let x = Matrix::from_vec(2, 4, vec![0.5, -0.1, 0.2, 0.9, -0.3, 0.3, 0.8, -0.6]);
        let a = net.forward(&x);
        let b = net.predict(&x);
        assert_eq!(a, b);
        assert_eq!(a.shape(), (2, 3));
        assert_eq!(net.num_classes(), 3);
    }

    #[test]
    fn test_state_dict_round_trip_into_fresh_network() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = Network::from_spec(&tiny_spec(), &mut rng);
        let mut other = Network::from_spec(&tiny_spec(), &mut rng);
        assert_ne!(net.state_dict(), other.state_dict());

        other.load_state_dict(&net.state_dict()).unwrap();
        assert_eq!(net.state_dict(), other.state_dict());
        assert_eq!(net.num_parameters(), 4 * 5 + 5 + 5 * 3 + 3);
    }

    #[test]
    fn test_load_state_dict_rejects_shape_mismatch() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = Network::from_spec(&tiny_spec(), &mut rng);
        let mut state = net.state_dict();
        state.tensors.insert("layers.0.bias".to_string(), Matrix::zeros(1, 2));
        let mut other = Network::from_spec(&tiny_spec(), &mut rng);
        assert!(other.load_state_dict(&state).is_err());
    }
}
