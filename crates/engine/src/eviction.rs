//! Eviction engine: age expiry, size-based LRU, and orphan reclamation.
//!
//! Every removal deletes the metadata row first and the file second. A row
//! therefore never points at a file that was already deleted by a sweep; a
//! file whose delete fails is left as an orphan for [`sweep_orphans`].
//!
//! Row deletes are compare-and-swap against the row as listed, so an entry
//! that is touched or re-stored while a sweep runs survives it.

use crate::error::CacheResult;
use crate::metrics;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use voxcache_metadata::{CacheEntryRow, EntryRepo, MetadataStore};
use voxcache_storage::BlobStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Number of candidates examined.
    pub items_processed: u64,
    /// Number of entries or files removed.
    pub items_deleted: u64,
    /// Bytes reclaimed.
    pub bytes_reclaimed: u64,
    /// Errors encountered and skipped.
    pub errors: u64,
}

impl SweepStats {
    /// Fold another sweep's counts into this one.
    pub fn merge(&mut self, other: SweepStats) {
        self.items_processed += other.items_processed;
        self.items_deleted += other.items_deleted;
        self.bytes_reclaimed += other.bytes_reclaimed;
        self.errors += other.errors;
    }
}

/// Result of trying to evict a single entry.
enum Eviction {
    /// Row and file removed (file delete may have failed and been counted).
    Removed { file_error: bool },
    /// The row changed or vanished since it was listed.
    Skipped,
}

/// Remove one listed entry: CAS-delete its row, then its file.
async fn evict_entry(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    entry: &CacheEntryRow,
) -> CacheResult<Eviction> {
    if !metadata.remove_entry_if_unchanged(entry).await? {
        return Ok(Eviction::Skipped);
    }

    let file_error = match blobs.delete(&entry.file_path).await {
        Ok(_) => false,
        Err(e) => {
            tracing::warn!(
                cache_key = %entry.cache_key,
                file_path = %entry.file_path,
                error = %e,
                "Failed to delete evicted file, leaving it for the orphan sweep"
            );
            true
        }
    };

    Ok(Eviction::Removed { file_error })
}

/// Fold one eviction attempt into `stats`.
fn tally(
    stats: &mut SweepStats,
    entry: &CacheEntryRow,
    result: CacheResult<Eviction>,
    reason: &str,
) {
    match result {
        Ok(Eviction::Removed { file_error }) => {
            stats.items_deleted += 1;
            stats.bytes_reclaimed += entry.size_bytes();
            if file_error {
                stats.errors += 1;
            }
            metrics::record_eviction(reason, entry.size_bytes());
        }
        Ok(Eviction::Skipped) => {
            tracing::debug!(
                cache_key = %entry.cache_key,
                "Entry changed during sweep, skipping"
            );
        }
        Err(e) => {
            tracing::warn!(
                cache_key = %entry.cache_key,
                error = %e,
                "Failed to evict entry"
            );
            stats.errors += 1;
        }
    }
}

/// Remove every entry created more than `max_age` before `now`.
pub async fn sweep_expired(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    max_age: Duration,
    now: OffsetDateTime,
) -> CacheResult<SweepStats> {
    let mut stats = SweepStats::default();
    let cutoff = now - max_age;

    for entry in metadata.list_older_than(cutoff).await? {
        stats.items_processed += 1;
        let result = evict_entry(metadata, blobs, &entry).await;
        tally(&mut stats, &entry, result, metrics::REASON_AGE);
    }

    if stats.items_deleted > 0 {
        tracing::info!(
            removed = stats.items_deleted,
            bytes = stats.bytes_reclaimed,
            errors = stats.errors,
            "Removed expired cache entries"
        );
    }

    Ok(stats)
}

/// Evict least recently accessed entries until the recorded total is at or
/// below `max_size_bytes`.
pub async fn enforce_size_limit(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    max_size_bytes: u64,
) -> CacheResult<SweepStats> {
    let mut stats = SweepStats::default();

    let total = metadata.total_size().await?;
    if total <= max_size_bytes {
        return Ok(stats);
    }
    let excess = total - max_size_bytes;

    for entry in metadata.list_by_recency_ascending().await? {
        if stats.bytes_reclaimed >= excess {
            break;
        }
        stats.items_processed += 1;
        let result = evict_entry(metadata, blobs, &entry).await;
        tally(&mut stats, &entry, result, metrics::REASON_SIZE);
    }

    tracing::info!(
        total_bytes = total,
        limit_bytes = max_size_bytes,
        removed = stats.items_deleted,
        freed_bytes = stats.bytes_reclaimed,
        "Evicted entries to enforce size limit"
    );

    Ok(stats)
}

/// Delete files no entry references whose modification time is more than
/// `grace` before `now`.
///
/// Young files are kept: they may belong to a store that has written its
/// blob but not yet committed its row. References are matched by file name,
/// so moving the cache root does not orphan its files.
pub async fn sweep_orphans(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    grace: Duration,
    now: OffsetDateTime,
) -> CacheResult<SweepStats> {
    let mut stats = SweepStats::default();
    let cutoff = now - grace;

    for blob in blobs.list().await? {
        stats.items_processed += 1;

        let Some(modified) = blob.modified else {
            continue;
        };
        if modified > cutoff {
            continue;
        }

        match metadata.file_path_referenced(&blob.name).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(file_path = %blob.name, error = %e, "Failed to check file reference");
                stats.errors += 1;
                continue;
            }
        }

        match blobs.delete(&blob.name).await {
            Ok(true) => {
                stats.items_deleted += 1;
                stats.bytes_reclaimed += blob.size;
                metrics::record_eviction(metrics::REASON_ORPHAN, blob.size);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(file_path = %blob.name, error = %e, "Failed to delete orphan file");
                stats.errors += 1;
            }
        }
    }

    if stats.items_deleted > 0 {
        tracing::info!(
            removed = stats.items_deleted,
            bytes = stats.bytes_reclaimed,
            "Removed orphaned cache files"
        );
    }

    Ok(stats)
}
