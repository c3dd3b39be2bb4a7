//! The cache facade.

use crate::error::CacheResult;
use crate::eviction::{self, SweepStats};
use crate::metrics;
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use voxcache_core::{CacheConfig, CacheKey};
use voxcache_metadata::{EntryRepo, MetadataStore, NewCacheEntry, StatsRepo, VoiceCount};
use voxcache_storage::{BlobStore, StorageError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An artifact accepted by [`VoxCache::store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Cache usage report.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_size_bytes: u64,
    /// Total size in MiB, rounded to one decimal.
    pub total_size_mb: f64,
    pub total_accesses: u64,
    /// Mean access count, rounded to one decimal.
    pub avg_accesses: f64,
    pub recent_entries_24h: u64,
    pub max_size_gb: f64,
    pub max_age_days: u32,
    pub top_voices: Vec<VoiceCount>,
}

/// Disk-backed, size- and age-bounded cache of rendered audio.
///
/// Entries are addressed by the content key of `(text, voice, model)`.
/// Several instances, in this process or others, may share one root: all
/// coordination goes through the metadata database.
pub struct VoxCache {
    config: CacheConfig,
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    /// Serializes stores of the same key within this instance.
    store_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl VoxCache {
    /// Open the cache at `config.root`, creating its layout if needed.
    ///
    /// Expired entries are removed before returning, and unreferenced files
    /// are reclaimed when `sweep_orphans_on_open` is set.
    pub async fn open(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let metadata = voxcache_metadata::from_config(&config).await?;
        let blobs = voxcache_storage::from_config(&config).await?;
        let cache = Self::with_stores(config, metadata, blobs)?;

        cache.sweep_expired().await?;
        if cache.config.sweep_orphans_on_open {
            cache.sweep_orphans().await?;
        }

        tracing::info!(
            root = %cache.config.root.display(),
            backend = cache.blobs.backend_name(),
            max_size_gb = cache.config.max_size_gb,
            max_age_days = cache.config.max_age_days,
            "Cache opened"
        );
        Ok(cache)
    }

    /// Build a cache over existing stores. Runs no maintenance.
    pub fn with_stores(
        config: CacheConfig,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> CacheResult<Self> {
        config.validate()?;
        metrics::register_metrics();

        Ok(Self {
            config,
            metadata,
            blobs,
            store_locks: DashMap::new(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path of the cached artifact for a request, if present.
    ///
    /// A hit refreshes the entry's recency and access count. An entry whose
    /// file has disappeared is purged and reported as a miss.
    #[instrument(skip(self, text))]
    pub async fn lookup(
        &self,
        text: &str,
        voice: &str,
        model: &str,
    ) -> CacheResult<Option<PathBuf>> {
        let key = CacheKey::derive(text, voice, model);

        let Some(entry) = self.metadata.get_entry(key.as_str()).await? else {
            debug!(key = %key, "Cache miss");
            metrics::record_lookup(metrics::OUTCOME_MISS);
            return Ok(None);
        };

        // A row naming anything but a file in the storage directory cannot
        // be served
        let path = match self.blobs.resolve(&entry.file_path) {
            Ok(path) => self.blobs.exists(&entry.file_path).await?.then_some(path),
            Err(StorageError::InvalidPath(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let Some(path) = path else {
            let removed = self.metadata.remove_entry_if_unchanged(&entry).await?;
            debug!(key = %key, file_path = %entry.file_path, removed, "Purged stale cache entry");
            metrics::record_lookup(metrics::OUTCOME_STALE);
            return Ok(None);
        };

        if !self
            .metadata
            .touch_entry(key.as_str(), OffsetDateTime::now_utc())
            .await?
        {
            debug!(key = %key, "Entry evicted during lookup");
            metrics::record_lookup(metrics::OUTCOME_MISS);
            return Ok(None);
        }

        debug!(key = %key, "Cache hit");
        metrics::record_lookup(metrics::OUTCOME_HIT);
        Ok(Some(path))
    }

    /// Copy `source` into the cache for a request, replacing any existing
    /// entry for the same content key, then enforce the size ceiling.
    #[instrument(skip(self, text, source))]
    pub async fn store(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        source: impl AsRef<Path>,
    ) -> CacheResult<StoredEntry> {
        let key = CacheKey::derive(text, voice, model);
        let source = source.as_ref();

        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.store_locked(&key, text, voice, model, source).await
        };
        drop(lock);
        self.release_key_lock(&key);

        match result {
            Ok(stored) => {
                metrics::STORES.inc();
                if let Err(e) = self.enforce_size_limit().await {
                    warn!(key = %key, error = %e, "Size limit enforcement failed after store");
                }
                Ok(stored)
            }
            Err(e) => {
                metrics::STORE_FAILURES.inc();
                Err(e)
            }
        }
    }

    async fn store_locked(
        &self,
        key: &CacheKey,
        text: &str,
        voice: &str,
        model: &str,
        source: &Path,
    ) -> CacheResult<StoredEntry> {
        // Each write gets a fresh name, so a sweep evicting the previous
        // entry for this key cannot delete the file about to be recorded
        let blob = self.blobs.write(key, source).await?;

        let new_entry = NewCacheEntry {
            cache_key: key.as_str().to_string(),
            text: text.to_string(),
            voice: voice.to_string(),
            model_name: model.to_string(),
            file_path: blob.name.clone(),
            file_size: i64::try_from(blob.size).unwrap_or(i64::MAX),
        };

        let superseded = match self
            .metadata
            .upsert_entry(&new_entry, OffsetDateTime::now_utc())
            .await
        {
            Ok(superseded) => superseded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to record cache entry, discarding file");
                self.discard_blob(&blob.name).await;
                return Err(e.into());
            }
        };

        if let Some(old) = superseded
            && old.file_path != blob.name
        {
            self.discard_blob(&old.file_path).await;
        }

        debug!(key = %key, size = blob.size, "Stored cache entry");
        Ok(StoredEntry {
            key: key.clone(),
            path: blob.path,
            size_bytes: blob.size,
        })
    }

    /// Delete a file no row references. Failures leave an orphan.
    async fn discard_blob(&self, name: &str) {
        if let Err(e) = self.blobs.delete(name).await {
            warn!(file_path = %name, error = %e, "Failed to delete unreferenced file");
        }
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.store_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once no store holds or awaits it.
    fn release_key_lock(&self, key: &CacheKey) {
        self.store_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Usage statistics.
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let stats = self
            .metadata
            .aggregate_stats(OffsetDateTime::now_utc())
            .await?;

        Ok(CacheStats {
            entry_count: stats.entry_count,
            total_size_bytes: stats.total_size,
            total_size_mb: round1(stats.total_size as f64 / BYTES_PER_MB),
            total_accesses: stats.total_accesses,
            avg_accesses: round1(stats.avg_accesses),
            recent_entries_24h: stats.recent_entries_24h,
            max_size_gb: self.config.max_size_gb,
            max_age_days: self.config.max_age_days,
            top_voices: stats.top_voices,
        })
    }

    /// Remove every file, then every entry. Returns the number of entries
    /// removed.
    pub async fn clear(&self) -> CacheResult<u64> {
        self.blobs.clear_all().await?;
        let removed = self.metadata.clear_entries().await?;
        tracing::info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Remove entries older than the configured maximum age.
    pub async fn sweep_expired(&self) -> CacheResult<SweepStats> {
        eviction::sweep_expired(
            self.metadata.as_ref(),
            self.blobs.as_ref(),
            self.config.max_age(),
            OffsetDateTime::now_utc(),
        )
        .await
    }

    /// Evict least recently used entries until under the size ceiling.
    pub async fn enforce_size_limit(&self) -> CacheResult<SweepStats> {
        eviction::enforce_size_limit(
            self.metadata.as_ref(),
            self.blobs.as_ref(),
            self.config.max_size_bytes(),
        )
        .await
    }

    /// Reclaim files no entry references once past the grace period.
    pub async fn sweep_orphans(&self) -> CacheResult<SweepStats> {
        eviction::sweep_orphans(
            self.metadata.as_ref(),
            self.blobs.as_ref(),
            self.config.orphan_grace(),
            OffsetDateTime::now_utc(),
        )
        .await
    }

    /// Verify both stores are reachable.
    pub async fn health_check(&self) -> CacheResult<()> {
        self.metadata.health_check().await?;
        self.blobs.health_check().await?;
        Ok(())
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
