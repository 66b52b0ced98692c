pub mod mix;
pub mod ops;
pub mod preprocess;

pub use mix::{AugMix, AugMixConfig};
pub use ops::{Operation, OperatorSet, Severity, ALL_OPERATIONS, BASE_OPERATIONS, MIN_IMAGE_SIDE};
pub use preprocess::{ImageTensor, Normalize, Preprocess};
