//! Metadata store trait and implementations.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{EntryRepo, StatsRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default time a statement waits on a locked database.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections kept by a file-backed store. WAL lets readers proceed while
/// one writer holds the lock.
const MAX_CONNECTIONS: u32 = 4;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: EntryRepo + StatsRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
///
/// Several processes may open the same database file; SQLite's file locks
/// plus the busy timeout serialize their writes.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout: Option<Duration>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let busy_timeout = busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT);

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "Opened metadata store");
        Ok(store)
    }

    /// Create a private in-memory store (for tests and throwaway caches).
    pub async fn in_memory() -> MetadataResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so keep one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Databases written by earlier tools used TIMESTAMP text columns and a
        // `last_accessed` column. Those can't be converted in place.
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='cache_entries')",
        )
        .fetch_one(&self.pool)
        .await?;

        if table_exists {
            let columns: Vec<(i32, String, String, i32, Option<String>, i32)> =
                sqlx::query_as("PRAGMA table_info(cache_entries)")
                    .fetch_all(&self.pool)
                    .await?;

            let required = [
                ("last_accessed_at", "INTEGER"),
                ("created_at", "INTEGER"),
                ("access_count", "INTEGER"),
            ];
            let mismatched: Vec<&str> = required
                .iter()
                .filter(|(name, ty)| {
                    !columns
                        .iter()
                        .any(|(_, col, col_ty, _, _, _)| col == name && col_ty.eq_ignore_ascii_case(ty))
                })
                .map(|(name, _)| *name)
                .collect();

            if !mismatched.is_empty() {
                return Err(MetadataError::IncompatibleSchema(format!(
                    "cache_entries is missing or mistyped columns: {}. \
                     Delete the metadata database to start a fresh cache.",
                    mismatched.join(", ")
                )));
            }
        }

        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;

        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::stats::{RECENT_WINDOW, TOP_VOICES_LIMIT};
    use time::OffsetDateTime;

    #[async_trait]
    impl EntryRepo for SqliteStore {
        async fn upsert_entry(
            &self,
            entry: &NewCacheEntry,
            now: OffsetDateTime,
        ) -> MetadataResult<Option<CacheEntryRow>> {
            let now = to_unix_nanos(now);

            // Write-first transaction: the DELETE takes the write lock before
            // anything is read, so a concurrent writer can't invalidate our
            // snapshot between reading the old row and inserting the new one.
            let mut tx = self.pool.begin().await?;

            let previous = sqlx::query_as::<_, CacheEntryRow>(
                "DELETE FROM cache_entries WHERE cache_key = ? RETURNING *",
            )
            .bind(&entry.cache_key)
            .fetch_optional(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO cache_entries
                    (cache_key, text, voice, model_name, file_path, file_size,
                     created_at, last_accessed_at, access_count)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(&entry.cache_key)
            .bind(&entry.text)
            .bind(&entry.voice)
            .bind(&entry.model_name)
            .bind(&entry.file_path)
            .bind(entry.file_size)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(previous)
        }

        async fn get_entry(&self, cache_key: &str) -> MetadataResult<Option<CacheEntryRow>> {
            let row = sqlx::query_as::<_, CacheEntryRow>(
                "SELECT * FROM cache_entries WHERE cache_key = ?",
            )
            .bind(cache_key)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn touch_entry(
            &self,
            cache_key: &str,
            accessed_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE cache_entries
                 SET last_accessed_at = ?, access_count = access_count + 1
                 WHERE cache_key = ?",
            )
            .bind(to_unix_nanos(accessed_at))
            .bind(cache_key)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn remove_entry(&self, cache_key: &str) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM cache_entries WHERE cache_key = ?")
                .bind(cache_key)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn remove_entry_if_unchanged(&self, entry: &CacheEntryRow) -> MetadataResult<bool> {
            let result = sqlx::query(
                r#"
                DELETE FROM cache_entries
                WHERE cache_key = ?
                  AND file_path = ?
                  AND created_at = ?
                  AND last_accessed_at = ?
                "#,
            )
            .bind(&entry.cache_key)
            .bind(&entry.file_path)
            .bind(to_unix_nanos(entry.created_at))
            .bind(to_unix_nanos(entry.last_accessed_at))
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(
                    cache_key = %entry.cache_key,
                    "Entry changed since it was observed, skipping removal"
                );
            }
            Ok(result.rows_affected() > 0)
        }

        async fn list_older_than(
            &self,
            cutoff: OffsetDateTime,
        ) -> MetadataResult<Vec<CacheEntryRow>> {
            let rows = sqlx::query_as::<_, CacheEntryRow>(
                "SELECT * FROM cache_entries WHERE created_at < ? ORDER BY created_at, cache_key",
            )
            .bind(to_unix_nanos(cutoff))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_by_recency_ascending(&self) -> MetadataResult<Vec<CacheEntryRow>> {
            let rows = sqlx::query_as::<_, CacheEntryRow>(
                "SELECT * FROM cache_entries ORDER BY last_accessed_at ASC, cache_key ASC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn total_size(&self) -> MetadataResult<u64> {
            let total: i64 =
                sqlx::query_scalar("SELECT COALESCE(SUM(file_size), 0) FROM cache_entries")
                    .fetch_one(&self.pool)
                    .await?;
            Ok(u64::try_from(total).unwrap_or(0))
        }

        async fn file_path_referenced(&self, file_path: &str) -> MetadataResult<bool> {
            let row: Option<(i32,)> =
                sqlx::query_as("SELECT 1 FROM cache_entries WHERE file_path = ? LIMIT 1")
                    .bind(file_path)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.is_some())
        }

        async fn clear_entries(&self) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM cache_entries")
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl StatsRepo for SqliteStore {
        async fn aggregate_stats(&self, now: OffsetDateTime) -> MetadataResult<EntryStats> {
            let totals: (i64, i64, i64, f64) = sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(file_size), 0),
                    COALESCE(SUM(access_count), 0),
                    COALESCE(AVG(access_count), 0.0)
                FROM cache_entries
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

            let recent_cutoff = to_unix_nanos(now - RECENT_WINDOW);
            let recent: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE last_accessed_at > ?")
                    .bind(recent_cutoff)
                    .fetch_one(&self.pool)
                    .await?;

            let top_voices = sqlx::query_as::<_, VoiceCount>(
                r#"
                SELECT voice, COUNT(*) AS count
                FROM cache_entries
                GROUP BY voice
                ORDER BY count DESC, voice ASC
                LIMIT ?
                "#,
            )
            .bind(TOP_VOICES_LIMIT)
            .fetch_all(&self.pool)
            .await?;

            Ok(EntryStats {
                entry_count: totals.0 as u64,
                total_size: totals.1 as u64,
                total_accesses: totals.2 as u64,
                avg_accesses: totals.3,
                recent_entries_24h: recent as u64,
                top_voices,
            })
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- One row per content key. Timestamps are unix nanoseconds (UTC).
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    voice TEXT NOT NULL,
    model_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1
);
-- Age sweep range scan.
CREATE INDEX IF NOT EXISTS idx_cache_entries_created_at ON cache_entries(created_at);
-- LRU ordering (covers the key tie-break).
CREATE INDEX IF NOT EXISTS idx_cache_entries_last_accessed ON cache_entries(last_accessed_at, cache_key);
-- Orphan sweep lookups.
CREATE INDEX IF NOT EXISTS idx_cache_entries_file_path ON cache_entries(file_path);
"#;
