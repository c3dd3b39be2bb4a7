//! Prometheus metrics for the cache engine.
//!
//! Counters are process-wide and shared by every cache instance in the
//! process. They count whether or not they have been registered;
//! registration only makes them visible to [`render_metrics`].

use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub const OUTCOME_HIT: &str = "hit";
pub const OUTCOME_MISS: &str = "miss";
pub const OUTCOME_STALE: &str = "stale";

pub const REASON_AGE: &str = "age";
pub const REASON_SIZE: &str = "size";
pub const REASON_ORPHAN: &str = "orphan";

// Lookup metrics
pub static LOOKUPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("voxcache_lookups_total", "Total number of cache lookups"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Store metrics
pub static STORES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "voxcache_stores_total",
        "Total number of artifacts stored",
    )
    .expect("metric creation failed")
});

pub static STORE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "voxcache_store_failures_total",
        "Total number of failed store operations",
    )
    .expect("metric creation failed")
});

// Eviction metrics
pub static EVICTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "voxcache_evictions_total",
            "Total number of entries or files evicted",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static BYTES_EVICTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("voxcache_bytes_evicted_total", "Total bytes reclaimed by eviction"),
        &["reason"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(LOOKUPS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORE_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EVICTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_EVICTED.clone()))
            .expect("metric registration failed");
    });
}

/// Record a lookup outcome.
pub fn record_lookup(outcome: &str) {
    LOOKUPS.with_label_values(&[outcome]).inc();
}

/// Record one eviction and the bytes it freed.
pub fn record_eviction(reason: &str, bytes: u64) {
    EVICTIONS.with_label_values(&[reason]).inc();
    BYTES_EVICTED.with_label_values(&[reason]).inc_by(bytes);
}

/// Render registered metrics in the Prometheus text format.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
