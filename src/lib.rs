pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod augment;
pub mod data;
pub mod train;
pub mod eval;
pub mod run;

// Convenience re-exports
pub use error::{AugMixError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Model, ModelRegistry, Network};
pub use loss::{CrossEntropyLoss, JsdConsistencyLoss};
pub use optim::{Optimizer, Scheduler};
pub use augment::{AugMix, AugMixConfig, Operation, Severity};
pub use data::{ArrayDataset, DataLoader, DatasetKind};
pub use train::{train_epoch, train_step, TrainConfig};
pub use eval::{test_c, test_p, EvalSettings};
pub use run::{run, RunConfig, RunContext, RunSummary};
