//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use voxcache_core::CacheKey;

/// A blob written into the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    /// File name inside the storage directory. This is what metadata records.
    pub name: String,
    /// Absolute path of the managed copy.
    pub path: PathBuf,
    /// Bytes copied.
    pub size: u64,
}

/// A file found in the storage directory.
#[derive(Clone, Debug)]
pub struct BlobInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Last modification time, if the platform reports one.
    pub modified: Option<OffsetDateTime>,
}

/// Blob store for cached artifacts.
///
/// Blobs are addressed by file name relative to the storage directory, so
/// recorded names stay valid when the directory is moved.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Copy `source` into the store for `key`, keeping the source's
    /// extension.
    ///
    /// Every write publishes a fresh name, never reusing one a previous
    /// write of the same key produced. The copy is published atomically.
    /// Fails with `SourceNotFound` if `source` is missing or is not a
    /// regular file.
    async fn write(&self, key: &CacheKey, source: &Path) -> StorageResult<StoredBlob>;

    /// Absolute path of a managed file. Rejects anything that is not a
    /// plain file name.
    fn resolve(&self, name: &str) -> StorageResult<PathBuf>;

    /// Check whether a managed file exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Delete a managed file. Returns false if it was already gone.
    async fn delete(&self, name: &str) -> StorageResult<bool>;

    /// Remove every managed file, leaving the directory empty.
    async fn clear_all(&self) -> StorageResult<()>;

    /// List the files currently in the storage directory.
    async fn list(&self) -> StorageResult<Vec<BlobInfo>>;

    /// The directory holding managed files.
    fn root(&self) -> &Path;

    /// Get the name of this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
