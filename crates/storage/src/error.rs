//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Blob storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
