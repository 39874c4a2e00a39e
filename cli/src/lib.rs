//! Argument parsing and output formatting for the `licensify` binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use licensify_client::{CacheInfo, LicenseConfig, LicenseError};
use licensify_types::ValidationResult;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "licensify")]
#[command(about = "Validate, activate and inspect Licensify licenses")]
pub struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the license API
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// License key
    #[arg(short, long, global = true)]
    pub key: Option<String>,

    /// Application version reported to the server
    #[arg(long, global = true)]
    pub app_version: Option<String>,

    /// Directory holding the license cache
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Offline grace period in days
    #[arg(long, global = true)]
    pub grace_days: Option<u32>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate the license, falling back to the offline cache
    Validate {
        /// Fail instead of using the cache when the server is unreachable
        #[arg(long)]
        online: bool,
    },
    /// Exit with status 0 if the license is valid, 1 otherwise
    Check,
    /// Activate a license key on this device
    Activate {
        /// License key to activate
        key: String,
    },
    /// Release this device's activation
    Deactivate,
    /// Revalidate periodically until interrupted
    Watch {
        /// Seconds between checks
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Show this device's fingerprint and details
    Device,
    /// Show or clear the offline cache
    Cache {
        /// Remove the cached validation
        #[arg(long)]
        clear: bool,
    },
}

/// Merges the configuration file (if any) with command-line overrides.
pub fn build_config(cli: &Cli) -> Result<LicenseConfig> {
    let mut config = match &cli.config {
        Some(path) => LicenseConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LicenseConfig::default(),
    };

    if let Some(server) = &cli.server {
        config.api_url = server.clone();
    }
    if let Some(key) = &cli.key {
        config.license_key = key.clone();
    }
    if let Command::Activate { key } = &cli.command {
        if config.license_key.trim().is_empty() {
            config.license_key = key.clone();
        }
    }
    if let Some(version) = &cli.app_version {
        config.app_version = version.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(days) = cli.grace_days {
        config.grace_period_days = days;
    }
    if cli.insecure {
        config.verify_tls = false;
    }
    if let Command::Watch {
        interval: Some(secs),
    } = cli.command
    {
        config.check_interval_secs = secs;
    }

    Ok(config)
}

/// One-line summary of a successful validation.
pub fn render_result(result: &ValidationResult) -> String {
    let source = if result.from_cache { "cached" } else { "online" };
    let mut line = format!("valid ({source}): {} license", result.license_type);
    if let Some(days) = result.days_remaining {
        line.push_str(&format!(", {days} days remaining"));
    }
    if result.unlimited_devices() {
        line.push_str(&format!(", {} devices (unlimited)", result.current_devices));
    } else {
        line.push_str(&format!(
            ", {}/{} devices",
            result.current_devices, result.max_devices
        ));
    }
    if let Some(deadline) = result.cache_expires_at.filter(|_| result.from_cache) {
        line.push_str(&format!(
            ", offline until {}",
            deadline.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    line
}

/// One-line summary of a failed validation.
pub fn render_error(err: &LicenseError) -> String {
    format!("{}: {err}", err.state())
}

/// One-line summary of the offline cache.
pub fn render_cache(info: Option<&CacheInfo>) -> String {
    match info {
        Some(info) => format!(
            "cached at {} for key {}, honoured until {} ({})",
            info.fetched_at.format("%Y-%m-%d %H:%M UTC"),
            info.key_hash,
            info.cache_deadline.format("%Y-%m-%d %H:%M UTC"),
            info.path.display()
        ),
        None => "no usable cache entry".to_string(),
    }
}

/// Serializes `value` as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
