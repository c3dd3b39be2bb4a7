//! Metadata store abstraction and implementations for voxcache.
//!
//! This crate owns the durable table of cache entries:
//! - Insert-or-replace, lookup, access tracking, and removal by content key
//! - Compare-and-swap removal for race-free sweeps
//! - Ordered listings for age expiry and LRU eviction
//! - Aggregate statistics

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{CacheEntryRow, EntryStats, NewCacheEntry, VoiceCount};
pub use repos::{EntryRepo, StatsRepo};
pub use store::{MetadataStore, SqliteStore};

use std::sync::Arc;
use voxcache_core::CacheConfig;

/// Create a metadata store from configuration.
pub async fn from_config(config: &CacheConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    let store = SqliteStore::new(config.metadata_path(), Some(config.busy_timeout())).await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}
