use serde::{Serialize, Deserialize};
use crate::activation::activation::ActivationFunction;

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`       — number of neurons in this layer
/// - `input_size` — output size of the previous layer, or the flattened
///                  image size (`3 * H * W`) for the first layer
/// - `activation` — activation applied after the linear transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// A serializable description of a network architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Registry name of the architecture.
    pub name: String,
    /// Ordered list of layer descriptions (input → logits).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// Chains `widths` hidden layers of `hidden` activation and ends with an
    /// identity layer of `num_classes` logits.
    pub fn stack(
        name: &str,
        input_dim: usize,
        widths: &[usize],
        hidden: ActivationFunction,
        num_classes: usize,
    ) -> NetworkSpec {
        let mut layers = Vec::with_capacity(widths.len() + 1);
        let mut prev = input_dim;
        for &w in widths {
            layers.push(LayerSpec { size: w, input_size: prev, activation: hidden });
            prev = w;
        }
        layers.push(LayerSpec { size: num_classes, input_size: prev, activation: ActivationFunction::Identity });
        NetworkSpec { name: name.to_string(), layers }
    }
}
