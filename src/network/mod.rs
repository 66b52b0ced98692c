pub mod model;
pub mod network;
pub mod registry;
pub mod spec;

pub use model::{Model, StateDict};
pub use network::Network;
pub use registry::{ModelConfig, ModelRegistry};
pub use spec::{NetworkSpec, LayerSpec};
