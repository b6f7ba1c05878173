//! Error types for the slice-lid pipeline

use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Result type for slice-lid pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for slice-lid pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Binary (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A requested variable does not exist in the row store
    #[error("Missing variable: {name}")]
    MissingVariable {
        /// Name of the missing variable
        name: String,
    },

    /// Data type mismatch
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// A column does not have the expected number of rows
    #[error("Column length mismatch for '{name}': expected {expected} rows, found {actual}")]
    LengthMismatch {
        /// Name of the offending column
        name: String,
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
    },

    /// Index out of bounds
    #[error("Index out of bounds: {index} >= {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length of the indexed collection
        len: usize,
    },

    /// A balanced sampling bucket has no rows to draw from
    #[error("Balanced sampler bucket {bucket} is empty")]
    EmptyBucket {
        /// Human readable bucket label
        bucket: String,
    },

    /// A target class has no samples, so its weight is undefined
    #[error("Class {class} has no samples, cannot compute class weights")]
    ZeroClassCount {
        /// Class index with a zero count
        class: usize,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid or unsupported configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline execution error
    #[error("Pipeline execution error: {0}")]
    PipelineExecution(String),

    /// Prefetch workers exited before producing a requested batch
    #[error("Worker pool disconnected while waiting for batch {index}")]
    WorkerDisconnected {
        /// Batch index that was being waited for
        index: usize,
    },
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::PipelineExecution(format!("lock poisoned: {err}"))
    }
}

impl Error {
    /// Shorthand for [`Error::MissingVariable`]
    pub fn missing_variable(name: &str) -> Self {
        Error::MissingVariable {
            name: name.to_string(),
        }
    }
}

/// Fails with [`Error::IndexOutOfBounds`] unless `index < len`
pub fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfBounds { index, len })
    }
}
