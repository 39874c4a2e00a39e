//! Client configuration.

use crate::error::{LicenseError, LicenseResult};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default offline grace period in days.
pub const DEFAULT_GRACE_PERIOD_DAYS: u32 = 30;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default background revalidation interval (1 hour).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60 * 60;

/// Configuration for the license validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Base URL of the license API (e.g. `https://licenses.example.com/api/v1/licenses`).
    pub api_url: String,
    /// The license key to validate.
    pub license_key: String,
    /// Version of the host application, reported to the server.
    pub app_version: String,
    /// Directory holding the license cache. A leading `~/` is expanded.
    pub cache_dir: PathBuf,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// How long a cached validation is honoured while offline.
    pub grace_period_days: u32,
    /// Interval between background revalidations.
    pub check_interval_secs: u64,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            license_key: String::new(),
            app_version: "1.0.0".to_string(),
            cache_dir: PathBuf::from("~/.licensify"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            verify_tls: true,
        }
    }
}

impl LicenseConfig {
    /// Creates a configuration with default values for everything but the
    /// server address and the key.
    pub fn new(api_url: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            license_key: license_key.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_grace_period_days(mut self, days: u32) -> Self {
        self.grace_period_days = days;
        self
    }

    #[must_use]
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Checks required fields and normalizes the API URL.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if a required field is empty or a
    /// duration is zero.
    pub fn validate(mut self) -> LicenseResult<Self> {
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        self.license_key = self.license_key.trim().to_string();

        if self.api_url.is_empty() {
            return Err(LicenseError::Config("api_url is required".to_string()));
        }
        if self.license_key.is_empty() {
            return Err(LicenseError::Config("license_key is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(LicenseError::Config("timeout_secs must be positive".to_string()));
        }
        if self.check_interval_secs == 0 {
            return Err(LicenseError::Config(
                "check_interval_secs must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> LicenseResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LicenseError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| LicenseError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// HTTP timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Offline grace period.
    #[must_use]
    pub fn grace_period(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.grace_period_days))
    }

    /// Background revalidation interval.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Cache directory with a leading `~` expanded to the home directory.
    #[must_use]
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_home(&self.cache_dir)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
