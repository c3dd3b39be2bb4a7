//! Operator CLI for voxcache.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxcache_core::CacheKey;
use voxcache_core::config::AppConfig;
use voxcache_engine::{CacheStats, SweepStats, VoxCache, metrics};

#[derive(Parser)]
#[command(name = "voxcache")]
#[command(about = "Inspect and maintain a voxcache audio cache")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(long, global = true, env = "VOXCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Cache root directory (overrides configuration)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Size ceiling in gigabytes (overrides configuration)
    #[arg(long, global = true)]
    max_size_gb: Option<f64>,

    /// Maximum entry age in days (overrides configuration)
    #[arg(long, global = true)]
    max_age_days: Option<u32>,
}

#[derive(Args, Clone)]
struct RequestArgs {
    /// Text that was rendered
    text: String,

    /// Voice name
    #[arg(long)]
    voice: String,

    /// Model identifier
    #[arg(long)]
    model: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cached file for a request; exits 1 on a miss
    Lookup {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Copy a rendered file into the cache
    Store {
        #[command(flatten)]
        request: RequestArgs,
        /// File to cache
        #[arg(long)]
        source: PathBuf,
    },
    /// Show cache statistics
    Stats {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Remove every entry and file
    Clear,
    /// Run maintenance sweeps (all of them when no flag is given)
    Sweep {
        /// Remove entries older than the maximum age
        #[arg(long, default_value_t = false)]
        expired: bool,
        /// Evict least recently used entries above the size ceiling
        #[arg(long, default_value_t = false)]
        size: bool,
        /// Delete unreferenced files past the grace period
        #[arg(long, default_value_t = false)]
        orphans: bool,
    },
    /// Print the content key for a request
    Key {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print metrics in Prometheus text format
    Metrics,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Key { request } => {
            println!(
                "{}",
                CacheKey::derive(&request.text, &request.voice, &request.model)
            );
        }
        Commands::Lookup { request } => {
            let cache = open_cache(&config).await?;
            match cache
                .lookup(&request.text, &request.voice, &request.model)
                .await?
            {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("cache miss");
                    return Ok(ExitCode::from(1));
                }
            }
        }
        Commands::Store { request, source } => {
            let cache = open_cache(&config).await?;
            let stored = cache
                .store(&request.text, &request.voice, &request.model, &source)
                .await
                .with_context(|| format!("failed to store {}", source.display()))?;
            println!("{}", stored.path.display());
        }
        Commands::Stats { json } => {
            let cache = open_cache(&config).await?;
            let stats = cache.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                render_stats(&stats);
            }
        }
        Commands::Clear => {
            let cache = open_cache(&config).await?;
            let removed = cache.clear().await?;
            println!("Removed {removed} entries");
        }
        Commands::Sweep {
            expired,
            size,
            orphans,
        } => {
            let cache = open_cache(&config).await?;
            let all = !(expired || size || orphans);
            let mut total = SweepStats::default();
            if all || expired {
                let stats = cache.sweep_expired().await?;
                render_sweep("expired", &stats);
                total.merge(stats);
            }
            if all || size {
                let stats = cache.enforce_size_limit().await?;
                render_sweep("size", &stats);
                total.merge(stats);
            }
            if all || orphans {
                let stats = cache.sweep_orphans().await?;
                render_sweep("orphans", &stats);
                total.merge(stats);
            }
            render_sweep("total", &total);
        }
        Commands::Metrics => {
            open_cache(&config).await?;
            print!("{}", metrics::render_metrics()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn open_cache(args: &ConfigArgs) -> Result<VoxCache> {
    let config = load_config(args)?;
    VoxCache::open(config.cache)
        .await
        .context("failed to open cache")
}

/// Load configuration: optional TOML file, then `VOXCACHE_` environment
/// variables, then command-line overrides.
fn load_config(args: &ConfigArgs) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if let Some(path) = &args.config {
        anyhow::ensure!(
            path.exists(),
            "configuration file not found: {}",
            path.display()
        );
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("VOXCACHE_").split("__"));

    let mut config: AppConfig = figment
        .extract()
        .context("failed to load configuration")?;

    apply_overrides(&mut config, args);
    config.cache.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, args: &ConfigArgs) {
    if let Some(root) = &args.root {
        config.cache.root = root.clone();
    }
    if let Some(max_size_gb) = args.max_size_gb {
        config.cache.max_size_gb = max_size_gb;
    }
    if let Some(max_age_days) = args.max_age_days {
        config.cache.max_age_days = max_age_days;
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

fn render_stats(stats: &CacheStats) {
    println!("Cache Statistics:");
    println!("  Entries: {}", stats.entry_count);
    println!(
        "  Total size: {} ({} MB)",
        format_bytes(stats.total_size_bytes),
        stats.total_size_mb
    );
    println!("  Total accesses: {}", stats.total_accesses);
    println!("  Average accesses: {}", stats.avg_accesses);
    println!("  Accessed in last 24h: {}", stats.recent_entries_24h);
    println!("  Size limit: {} GB", stats.max_size_gb);
    println!("  Max age: {} days", stats.max_age_days);
    if !stats.top_voices.is_empty() {
        println!("  Top voices:");
        for voice in &stats.top_voices {
            println!("    {}: {}", voice.voice, voice.count);
        }
    }
}

fn render_sweep(name: &str, stats: &SweepStats) {
    println!(
        "{name}: {} removed of {} examined, {} reclaimed, {} errors",
        stats.items_deleted,
        stats.items_processed,
        format_bytes(stats.bytes_reclaimed),
        stats.errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            config: None,
            root: None,
            max_size_gb: None,
            max_age_days: None,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_overrides_win_over_loaded_values() {
        let mut config = AppConfig::default();
        let overrides = ConfigArgs {
            root: Some(PathBuf::from("/var/cache/voxcache")),
            max_age_days: Some(7),
            ..args()
        };

        apply_overrides(&mut config, &overrides);
        assert_eq!(config.cache.root, std::path::Path::new("/var/cache/voxcache"));
        assert_eq!(config.cache.max_age_days, 7);
        assert_eq!(config.cache.max_size_gb, 5.0);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let missing = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/voxcache.toml")),
            ..args()
        };
        let err = load_config(&missing).unwrap_err();
        assert!(err.to_string().contains("configuration file not found"));
    }
}
