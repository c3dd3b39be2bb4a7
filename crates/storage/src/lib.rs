//! Blob storage abstraction and backends for voxcache.
//!
//! This crate provides:
//! - Key-addressed artifact files with atomic publication
//! - Path guarding so only files inside the storage directory are touched
//! - Directory listing for orphan reclamation
//! - Backends: local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBlobStore;
pub use error::{StorageError, StorageResult};
pub use traits::{BlobInfo, BlobStore, StoredBlob};

use std::sync::Arc;
use voxcache_core::CacheConfig;

/// Create a blob store from configuration.
pub async fn from_config(config: &CacheConfig) -> StorageResult<Arc<dyn BlobStore>> {
    let backend = FilesystemBlobStore::new(config.audio_dir()).await?;
    Ok(Arc::new(backend))
}
