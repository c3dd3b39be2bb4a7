//! Process-wide default cache instance.
//!
//! Prefer constructing a [`VoxCache`] and passing it where it is needed.
//! This exists for callers that cannot thread an instance through.

use crate::cache::VoxCache;
use crate::error::CacheResult;
use std::sync::Arc;
use tokio::sync::OnceCell;
use voxcache_core::CacheConfig;

static SHARED: OnceCell<Arc<VoxCache>> = OnceCell::const_new();

/// Get the shared cache, opening it with `config` on first use.
///
/// The first successful call wins: later calls return the same instance and
/// ignore their configuration. If opening fails, nothing is stored and the
/// next call tries again.
pub async fn shared(config: CacheConfig) -> CacheResult<Arc<VoxCache>> {
    let cache = SHARED
        .get_or_try_init(|| async { VoxCache::open(config.clone()).await.map(Arc::new) })
        .await?;

    if cache.config() != &config {
        tracing::debug!(
            active_root = %cache.config().root.display(),
            requested_root = %config.root.display(),
            "Shared cache already initialized, ignoring requested configuration"
        );
    }

    Ok(Arc::clone(cache))
}

/// The shared cache, if it has been initialized.
pub fn try_shared() -> Option<Arc<VoxCache>> {
    SHARED.get().cloned()
}
