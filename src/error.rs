//! Crate-wide error type.
//!
//! Every failure in this crate is fatal to the run: nothing retries, and the
//! binary logs the error and exits non-zero.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AugMixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bad run configuration (e.g. save path exists and is not a directory).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or inconsistent dataset files.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Malformed `.npy` array file.
    #[error("Array format error in '{path}': {reason}")]
    Array { path: PathBuf, reason: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A state dict or optimizer state that does not fit the live model.
    #[error("State mismatch: {0}")]
    StateMismatch(String),

    /// Distribution parameters rejected by `rand_distr`.
    #[error("Distribution error: {0}")]
    Distribution(String),

    #[error("Data loader error: {0}")]
    Loader(String),
}

pub type Result<T> = std::result::Result<T, AugMixError>;

impl AugMixError {
    /// Wraps an I/O error with the path that produced it.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AugMixError::File { path: path.into(), source }
    }

    pub fn array(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AugMixError::Array { path: path.into(), reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AugMixError::Config("./snapshots is not a dir".to_string());
        assert_eq!(format!("{}", err), "Configuration error: ./snapshots is not a dir");
    }

    #[test]
    fn test_file_error_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = AugMixError::file("/data/CIFAR-10-C/fog.npy", io);
        assert!(format!("{}", err).contains("fog.npy"));
    }
}
