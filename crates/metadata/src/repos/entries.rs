//! Cache entry repository.

use crate::error::MetadataResult;
use crate::models::{CacheEntryRow, NewCacheEntry};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for cache entry operations.
#[async_trait]
pub trait EntryRepo: Send + Sync {
    /// Insert an entry, or fully replace the entry with the same key.
    ///
    /// `created_at` and `last_accessed_at` are set to `now` and
    /// `access_count` to 1, on replace as well as on insert. Returns the
    /// superseded row so the caller can release its file.
    ///
    /// The delete of the old row and the insert of the new one happen in a
    /// single transaction.
    async fn upsert_entry(
        &self,
        entry: &NewCacheEntry,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<CacheEntryRow>>;

    /// Get an entry by key. Does not touch access fields.
    async fn get_entry(&self, cache_key: &str) -> MetadataResult<Option<CacheEntryRow>>;

    /// Record a successful access: set `last_accessed_at` and increment
    /// `access_count`. Returns false if the row no longer exists.
    async fn touch_entry(&self, cache_key: &str, accessed_at: OffsetDateTime)
    -> MetadataResult<bool>;

    /// Delete an entry. Returns whether a row was deleted; absent keys are
    /// not an error.
    async fn remove_entry(&self, cache_key: &str) -> MetadataResult<bool>;

    /// Delete an entry only if it is still the row the caller observed.
    ///
    /// The row must match on key, file path, creation time, and last access
    /// time. A concurrent touch or re-store makes this a no-op, so sweeps
    /// never evict an entry that was just refreshed and never drop a row
    /// that now points at a different file.
    async fn remove_entry_if_unchanged(&self, entry: &CacheEntryRow) -> MetadataResult<bool>;

    /// Entries created strictly before `cutoff`, oldest first.
    async fn list_older_than(&self, cutoff: OffsetDateTime) -> MetadataResult<Vec<CacheEntryRow>>;

    /// All entries from least to most recently accessed, ties by key.
    async fn list_by_recency_ascending(&self) -> MetadataResult<Vec<CacheEntryRow>>;

    /// Sum of recorded file sizes (0 when empty).
    async fn total_size(&self) -> MetadataResult<u64>;

    /// Whether any entry references `file_path`.
    async fn file_path_referenced(&self, file_path: &str) -> MetadataResult<bool>;

    /// Delete every entry. Returns the number of rows removed.
    async fn clear_entries(&self) -> MetadataResult<u64>;
}
