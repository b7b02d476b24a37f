//! Error type for Parquet store operations.

use std::path::Path;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Parquet encode/decode failure.
    #[error("Parquet read/write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array or schema failure.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error raised by the core types.
    #[error(transparent)]
    Core(#[from] ll_core::Error),
}

impl StoreError {
    /// Resource error naming a path.
    pub(crate) fn resource(path: &Path, msg: impl std::fmt::Display) -> Self {
        StoreError::Core(ll_core::Error::Resource(format!("{}: {msg}", path.display())))
    }
}

impl From<StoreError> for ll_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Core(e) => e,
            StoreError::Io(e) => ll_core::Error::Io(e),
            other => ll_core::Error::Resource(other.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
