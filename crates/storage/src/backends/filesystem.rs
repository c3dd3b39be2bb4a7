//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobInfo, BlobStore, StoredBlob};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;
use voxcache_core::CacheKey;

/// Prefix of in-flight temp files. They are never referenced by metadata,
/// so a crashed write is reclaimed by the orphan sweep.
const TEMP_PREFIX: &str = ".tmp.";

/// Filesystem blob store rooted at a single flat directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create the backend, creating the directory if needed.
    ///
    /// The root is canonicalized so every stored path is absolute.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    /// Fresh file name for a write of `key`: `<key>.<uuid>[.<ext>]`.
    fn blob_name(key: &CacheKey, extension: Option<&str>) -> String {
        let unique = Uuid::new_v4().simple();
        match extension {
            Some(ext) => format!("{}.{unique}.{ext}", key.as_str()),
            None => format!("{}.{unique}", key.as_str()),
        }
    }

    /// Join a plain file name onto the root, rejecting anything else.
    fn resolve_name(&self, name: &str) -> StorageResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => Ok(self.root.join(name)),
            _ => Err(StorageError::InvalidPath(format!(
                "not a file name inside {}: {name}",
                self.root.display()
            ))),
        }
    }

    /// Copy `source` into `temp_path`, fsync, and rename onto `final_path`.
    async fn copy_atomic(
        source: &Path,
        temp_path: &Path,
        final_path: &Path,
    ) -> StorageResult<u64> {
        let size = {
            let mut reader = fs::File::open(source).await?;
            let mut writer = fs::File::create(temp_path).await?;
            let size = tokio::io::copy(&mut reader, &mut writer).await?;
            // Ensure data is on disk before it becomes visible
            writer.sync_all().await?;
            size
        };
        fs::rename(temp_path, final_path).await?;
        Ok(size)
    }
}

/// Extension of `source`, if it has one.
fn source_extension(source: &Path) -> Option<String> {
    source
        .extension()
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_string_lossy().into_owned())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self), fields(backend = "filesystem", key = %key))]
    async fn write(&self, key: &CacheKey, source: &Path) -> StorageResult<StoredBlob> {
        match fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::SourceNotFound(source.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::SourceNotFound(source.to_path_buf()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        let name = Self::blob_name(key, source_extension(source).as_deref());
        let path = self.root.join(&name);

        // Unique temp name so concurrent writers of one key never share a file
        let temp_path = self
            .root
            .join(format!("{TEMP_PREFIX}{}.{}", key.as_str(), Uuid::new_v4()));

        match Self::copy_atomic(source, &temp_path, &path).await {
            Ok(size) => {
                debug!(name = %name, size, "Blob written");
                Ok(StoredBlob { name, path, size })
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        self.resolve_name(name)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.resolve_name(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &str) -> StorageResult<bool> {
        let path = self.resolve_name(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn clear_all(&self) -> StorageResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self) -> StorageResult<Vec<BlobInfo>> {
        let mut results = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks; only regular files are managed
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Deleted between read_dir and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            // Names this store never produces cannot be recorded in metadata
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            results.push(BlobInfo {
                name,
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().ok().map(OffsetDateTime::from),
            });
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
