pub mod adapter;
pub mod array;
pub mod cifar;
pub mod dataset;
pub mod loader;
pub mod npy;
pub mod transform;

pub use adapter::{AugMixDataset, PreprocessedDataset};
pub use array::{ArrayDataset, ImageArray};
pub use cifar::{load_cifar, DatasetKind, Split};
pub use dataset::{Batch, Dataset, LabeledImages, Sample, SampleInput};
pub use loader::{Batches, DataLoader};
pub use npy::{NpyArray, NpyData};
pub use transform::RandomCropFlip;
