//! Cache error types.

use std::path::PathBuf;
use voxcache_metadata::MetadataError;
use voxcache_storage::StorageError;

/// Errors returned by the cache facade.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] voxcache_core::Error),
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SourceNotFound(path) => CacheError::SourceNotFound(path),
            other => CacheError::Storage(other),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_not_found_is_lifted() {
        let err: CacheError = StorageError::SourceNotFound(PathBuf::from("/tmp/x.wav")).into();
        assert!(matches!(err, CacheError::SourceNotFound(p) if p == PathBuf::from("/tmp/x.wav")));

        let err: CacheError = StorageError::InvalidPath("nope".into()).into();
        assert!(matches!(err, CacheError::Storage(_)));
    }
}
