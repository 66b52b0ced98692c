pub mod cross_entropy;
pub mod consistency;

pub use cross_entropy::CrossEntropyLoss;
pub use consistency::{JsdConsistencyLoss, CONSISTENCY_WEIGHT, MIXTURE_CLAMP_MIN};
