//! Error types shared across the seisloc crates.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SeislocError>;

/// Errors produced by the seisloc engines and drivers.
#[derive(Error, Debug)]
pub enum SeislocError {
    /// Invalid job or engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input buffers disagree about their dimensions.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The requested compute backend cannot be created.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The compute backend failed while running a job.
    #[error("backend error: {0}")]
    BackendError(String),

    /// Moving data between host and device failed.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// IO error while loading job inputs.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
