//! Cache engine test utilities.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use voxcache_core::{BYTES_PER_GB, CacheConfig, CacheKey};
use voxcache_engine::VoxCache;
use voxcache_metadata::{EntryRepo, NewCacheEntry, SqliteStore};
use voxcache_storage::{BlobStore, FilesystemBlobStore};

/// A cache over file-backed stores in a temp directory.
///
/// The concrete stores are kept so tests can seed state the public API
/// cannot produce, such as entries created in the past.
#[allow(dead_code)]
pub struct TestCache {
    pub cache: Arc<VoxCache>,
    pub metadata: Arc<SqliteStore>,
    pub blobs: Arc<FilesystemBlobStore>,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestCache {
    pub async fn new() -> Self {
        Self::with_config(|config| config).await
    }

    pub async fn with_config(configure: impl FnOnce(CacheConfig) -> CacheConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(CacheConfig::new(temp_dir.path().join("cache")));

        let metadata = Arc::new(
            SqliteStore::new(config.metadata_path(), None)
                .await
                .expect("Failed to create metadata store"),
        );
        let blobs = Arc::new(
            FilesystemBlobStore::new(config.audio_dir())
                .await
                .expect("Failed to create blob store"),
        );
        let cache = VoxCache::with_stores(config, metadata.clone(), blobs.clone())
            .expect("Failed to build cache");

        std::fs::create_dir_all(temp_dir.path().join("sources")).unwrap();

        Self {
            cache: Arc::new(cache),
            metadata,
            blobs,
            temp_dir,
        }
    }

    /// Write a source artifact outside the cache root.
    pub fn source(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join("sources").join(name);
        std::fs::write(&path, data).expect("Failed to write source");
        path
    }

    /// Files currently in the audio directory.
    pub fn audio_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(self.blobs.root())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    /// Seed an entry as if it had been stored at `created_at`.
    pub async fn insert_at(
        &self,
        text: &str,
        voice: &str,
        data: &[u8],
        created_at: OffsetDateTime,
    ) -> PathBuf {
        let key = CacheKey::derive(text, voice, MODEL);
        let source = self.source(&format!("{}.wav", key.as_str()), data);
        let blob = self.blobs.write(&key, &source).await.unwrap();

        self.metadata
            .upsert_entry(
                &NewCacheEntry {
                    cache_key: key.as_str().to_string(),
                    text: text.to_string(),
                    voice: voice.to_string(),
                    model_name: MODEL.to_string(),
                    file_path: blob.name.clone(),
                    file_size: blob.size as i64,
                },
                created_at,
            )
            .await
            .unwrap();
        blob.path
    }
}

/// Model identifier used throughout the tests.
#[allow(dead_code)]
pub const MODEL: &str = "tts-1";

/// Size ceiling in GB equal to `bytes`.
#[allow(dead_code)]
pub fn gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Wait long enough for timestamps to differ.
#[allow(dead_code)]
pub async fn pause() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}
