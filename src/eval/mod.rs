pub mod clean;
pub mod corruption;
pub mod perturbation;

pub use clean::{test, EvalSettings};
pub use corruption::{test_c, test_c_with, CORRUPTIONS};
pub use perturbation::{flip_prob, is_noise_perturbation, test_p, test_p_with, ClipArray, PERTURBATIONS};
