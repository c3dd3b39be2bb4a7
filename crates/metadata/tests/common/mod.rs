//! Metadata store test utilities.

use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use voxcache_metadata::{MetadataResult, MetadataStore, NewCacheEntry, SqliteStore};

/// A file-backed test metadata store that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<SqliteStore>,
    pub temp_dir: TempDir,
}

impl TestMetadata {
    /// Create a new store in a fresh temp directory.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("cache.db");
        let store = SqliteStore::new(&db_path, None).await?;

        Ok(Self {
            store: Arc::new(store),
            temp_dir,
        })
    }

    /// Open a second, independent store on the same database file.
    #[allow(dead_code)]
    pub async fn reopen(&self) -> MetadataResult<SqliteStore> {
        SqliteStore::new(self.temp_dir.path().join("cache.db"), None).await
    }

    /// Get the store as a trait object.
    #[allow(dead_code)]
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// Build an entry with a predictable file name.
#[allow(dead_code)]
pub fn entry(key: &str, voice: &str, size: i64) -> NewCacheEntry {
    NewCacheEntry {
        cache_key: key.to_string(),
        text: format!("Text for {key}"),
        voice: voice.to_string(),
        model_name: "tts-1".to_string(),
        file_path: format!("{key}.wav"),
        file_size: size,
    }
}

/// A fixed base time so tests control ordering exactly.
#[allow(dead_code)]
pub fn base_time() -> OffsetDateTime {
    time::macros::datetime!(2026-01-01 00:00:00 UTC)
}
