//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;

/// Cache engine configuration.
///
/// Supplied once at construction; there is no dynamic reload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding the artifact subdirectory and the metadata file.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Total size ceiling in gigabytes (1 GB = 1024^3 bytes).
    #[serde(default = "default_max_size_gb")]
    pub max_size_gb: f64,
    /// Maximum entry age in days, measured from creation.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// Minimum age in seconds before an unreferenced artifact file is
    /// treated as an orphan. Protects files whose metadata row is still
    /// being written by another process.
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
    /// Run the orphan sweep when the cache is opened (default: true).
    #[serde(default = "default_sweep_orphans_on_open")]
    pub sweep_orphans_on_open: bool,
    /// How long a metadata write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from("cache")
}

fn default_max_size_gb() -> f64 {
    5.0
}

fn default_max_age_days() -> u32 {
    30
}

fn default_orphan_grace_secs() -> u64 {
    3600 // 1 hour
}

fn default_sweep_orphans_on_open() -> bool {
    true
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_size_gb: default_max_size_gb(),
            max_age_days: default_max_age_days(),
            orphan_grace_secs: default_orphan_grace_secs(),
            sweep_orphans_on_open: default_sweep_orphans_on_open(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at `root` with default limits.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the size ceiling in gigabytes.
    pub fn with_max_size_gb(mut self, max_size_gb: f64) -> Self {
        self.max_size_gb = max_size_gb;
        self
    }

    /// Set the maximum entry age in days.
    pub fn with_max_age_days(mut self, max_age_days: u32) -> Self {
        self.max_age_days = max_age_days;
        self
    }

    /// Size ceiling in bytes. Truncates toward zero like the GB conversion
    /// always has.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_gb * crate::BYTES_PER_GB) as u64
    }

    /// Maximum entry age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::days(i64::from(self.max_age_days))
    }

    /// Orphan grace period as a Duration.
    pub fn orphan_grace(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.orphan_grace_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Busy timeout as a std::time::Duration.
    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.busy_timeout_secs)
    }

    /// Directory holding artifact files.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(crate::AUDIO_SUBDIR)
    }

    /// Path of the metadata database.
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(crate::METADATA_FILE)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.max_size_gb.is_finite() || self.max_size_gb <= 0.0 {
            return Err(crate::Error::InvalidConfig(format!(
                "max_size_gb must be a positive number, got {}",
                self.max_size_gb
            )));
        }

        if self.max_age_days == 0 {
            return Err(crate::Error::InvalidConfig(
                "max_age_days must be at least 1".to_string(),
            ));
        }

        if self.root.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig(
                "root must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Complete application configuration as loaded by the CLI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache engine configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}
