//! Core domain types and shared logic for voxcache.
//!
//! This crate defines what every other crate agrees on:
//! - Content keys derived from normalized render requests
//! - Cache configuration and its on-disk layout
//! - The core error type

pub mod config;
pub mod error;
pub mod key;

pub use config::CacheConfig;
pub use error::{Error, Result};
pub use key::{CacheKey, normalize_text};

/// Subdirectory of the cache root holding artifact files.
pub const AUDIO_SUBDIR: &str = "audio";

/// File name of the metadata database inside the cache root.
pub const METADATA_FILE: &str = "cache.db";

/// Bytes per gigabyte used when converting the configured size ceiling.
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
