use std::collections::BTreeMap;

use rand::RngCore;

use crate::activation::activation::ActivationFunction;
use crate::error::{AugMixError, Result};
use crate::network::model::Model;
use crate::network::network::Network;
use crate::network::spec::NetworkSpec;

/// Inputs every architecture constructor receives.
#[derive(Debug, Clone, Copy)]
pub struct ModelConfig {
    /// Flattened image size, `3 * H * W`.
    pub input_dim: usize,
    pub num_classes: usize,
    /// Base width of hidden layers; architectures scale from it.
    pub hidden_size: usize,
}

pub type ModelConstructor = fn(&ModelConfig, &mut dyn RngCore) -> Box<dyn Model>;

/// Maps architecture names to constructors.
pub struct ModelRegistry {
    constructors: BTreeMap<&'static str, ModelConstructor>,
}

impl ModelRegistry {
    pub fn empty() -> ModelRegistry {
        ModelRegistry { constructors: BTreeMap::new() }
    }

    /// The built-in architectures: `linear`, `mlp`, `wide_mlp`, `deep_mlp`.
    pub fn with_defaults() -> ModelRegistry {
        let mut registry = ModelRegistry::empty();
        registry.register("linear", build_linear);
        registry.register("mlp", build_mlp);
        registry.register("wide_mlp", build_wide_mlp);
        registry.register("deep_mlp", build_deep_mlp);
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: ModelConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn build(&self, name: &str, config: &ModelConfig, rng: &mut dyn RngCore) -> Result<Box<dyn Model>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            AugMixError::Config(format!(
                "unknown model '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(constructor(config, rng))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry::with_defaults()
    }
}

fn build_linear(config: &ModelConfig, rng: &mut dyn RngCore) -> Box<dyn Model> {
    let spec = NetworkSpec::stack("linear", config.input_dim, &[], ActivationFunction::Identity, config.num_classes);
    Box::new(Network::from_spec(&spec, rng))
}

fn build_mlp(config: &ModelConfig, rng: &mut dyn RngCore) -> Box<dyn Model> {
    let h = config.hidden_size;
    let spec = NetworkSpec::stack("mlp", config.input_dim, &[h, h / 2], ActivationFunction::ReLU, config.num_classes);
    Box::new(Network::from_spec(&spec, rng))
}

fn build_wide_mlp(config: &ModelConfig, rng: &mut dyn RngCore) -> Box<dyn Model> {
    let h = config.hidden_size * 2;
    let spec = NetworkSpec::stack("wide_mlp", config.input_dim, &[h], ActivationFunction::Gelu, config.num_classes);
    Box::new(Network::from_spec(&spec, rng))
}

fn build_deep_mlp(config: &ModelConfig, rng: &mut dyn RngCore) -> Box<dyn Model> {
    let h = config.hidden_size;
    let spec = NetworkSpec::stack(
        "deep_mlp",
        config.input_dim,
        &[h, h, h / 2, h / 2],
        ActivationFunction::LeakyReLU { alpha: 0.01 },
        config.num_classes,
    );
    Box::new(Network::from_spec(&spec, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_every_registered_model_emits_class_logits() {
        let registry = ModelRegistry::with_defaults();
        let config = ModelConfig { input_dim: 12, num_classes: 4, hidden_size: 8 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let x = Matrix::zeros(3, 12);
        for name in registry.names() {
            let model = registry.build(name, &config, &mut rng).unwrap();
            assert_eq!(model.name(), name);
            assert_eq!(model.predict(&x).shape(), (3, 4));
        }
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let registry = ModelRegistry::with_defaults();
        let config = ModelConfig { input_dim: 12, num_classes: 4, hidden_size: 8 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = registry.build("wrn", &config, &mut rng).err().unwrap();
        assert!(matches!(err, AugMixError::Config(_)));
    }
}
