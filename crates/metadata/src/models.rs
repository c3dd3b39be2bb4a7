//! Database models mapping to the metadata schema.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use time::OffsetDateTime;

/// Convert a timestamp to the INTEGER nanosecond form stored in SQLite.
///
/// Saturates outside the i64 range (years before 1678 or after 2262).
pub fn to_unix_nanos(ts: OffsetDateTime) -> i64 {
    let nanos = ts.unix_timestamp_nanos();
    i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
}

/// Convert a stored nanosecond timestamp back to UTC.
pub fn from_unix_nanos(nanos: i64) -> OffsetDateTime {
    // Every i64 nanosecond value is within OffsetDateTime's range.
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

// =============================================================================
// Cache entries
// =============================================================================

/// One cached artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryRow {
    pub cache_key: String,
    /// Request text as given by the caller (not normalized).
    pub text: String,
    pub voice: String,
    pub model_name: String,
    /// Name of the backing artifact file, relative to the audio directory.
    pub file_path: String,
    /// Size recorded at creation; authoritative for size accounting.
    pub file_size: i64,
    pub created_at: OffsetDateTime,
    pub last_accessed_at: OffsetDateTime,
    pub access_count: i64,
}

impl CacheEntryRow {
    /// Recorded size as an unsigned byte count.
    pub fn size_bytes(&self) -> u64 {
        u64::try_from(self.file_size).unwrap_or(0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for CacheEntryRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            cache_key: row.try_get("cache_key")?,
            text: row.try_get("text")?,
            voice: row.try_get("voice")?,
            model_name: row.try_get("model_name")?,
            file_path: row.try_get("file_path")?,
            file_size: row.try_get("file_size")?,
            created_at: from_unix_nanos(row.try_get("created_at")?),
            last_accessed_at: from_unix_nanos(row.try_get("last_accessed_at")?),
            access_count: row.try_get("access_count")?,
        })
    }
}

/// Attributes of an entry about to be written. Timestamps and the access
/// counter are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    pub cache_key: String,
    pub text: String,
    pub voice: String,
    pub model_name: String,
    pub file_path: String,
    pub file_size: i64,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Entry count per voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct VoiceCount {
    pub voice: String,
    pub count: i64,
}

/// Aggregate statistics over all entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryStats {
    pub entry_count: u64,
    pub total_size: u64,
    pub total_accesses: u64,
    pub avg_accesses: f64,
    /// Entries accessed within the 24 hours before the query.
    pub recent_entries_24h: u64,
    /// Up to five voices with the most entries, most first.
    pub top_voices: Vec<VoiceCount>,
}
