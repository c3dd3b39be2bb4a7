//! Cache engine for voxcache.
//!
//! This crate ties the metadata store and the blob store together:
//! - [`VoxCache`], the lookup/store/stats/clear facade
//! - Age expiry, size-based LRU eviction, and orphan reclamation
//! - A lazily created process-wide default instance
//! - Prometheus counters for lookups, stores, and evictions

pub mod cache;
pub mod error;
pub mod eviction;
pub mod metrics;
pub mod shared;

pub use cache::{CacheStats, StoredEntry, VoxCache};
pub use error::{CacheError, CacheResult};
pub use eviction::SweepStats;
pub use shared::{shared, try_shared};
pub use voxcache_core::{CacheConfig, CacheKey};
