//! Aggregate statistics repository.

use crate::error::MetadataResult;
use crate::models::EntryStats;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Number of voices reported in [`EntryStats::top_voices`].
pub const TOP_VOICES_LIMIT: u32 = 5;

/// Window for [`EntryStats::recent_entries_24h`].
pub const RECENT_WINDOW: time::Duration = time::Duration::hours(24);

/// Repository for aggregate queries.
#[async_trait]
pub trait StatsRepo: Send + Sync {
    /// Aggregate statistics as of `now`.
    ///
    /// Recent entries are those with `last_accessed_at` strictly after
    /// `now - 24h`. Top voices are ordered by entry count descending, then by
    /// voice name so ties resolve deterministically.
    async fn aggregate_stats(&self, now: OffsetDateTime) -> MetadataResult<EntryStats>;
}
