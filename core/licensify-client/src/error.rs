//! Error types for the licensing client.

use chrono::{DateTime, Utc};
use licensify_types::ValidationState;
use std::fmt;
use thiserror::Error;

/// Why no cached proof could be honoured during an offline validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMiss {
    /// Nothing cached for this license key.
    NotFound,
    /// The cache file is unreadable, tampered with, or from another schema version.
    Corrupt,
    /// The entry was recorded on a different device.
    DeviceMismatch,
    /// The local clock reads earlier than the time the entry was fetched.
    ClockRewound,
    /// The grace period or the license itself ran out.
    GraceElapsed,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no cached validation",
            Self::Corrupt => "cached validation is unreadable",
            Self::DeviceMismatch => "cached validation belongs to another device",
            Self::ClockRewound => "system clock is earlier than the cached validation",
            Self::GraceElapsed => "offline grace period has elapsed",
        };
        f.write_str(msg)
    }
}

/// Licensing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// The server does not know the key, or the request was malformed.
    #[error("invalid license key")]
    InvalidLicenseKey,

    /// License has expired.
    #[error("license expired{}", fmt_expiry(.expires_at))]
    LicenseExpired { expires_at: Option<DateTime<Utc>> },

    /// Device limit exceeded.
    #[error("device limit exceeded{}", fmt_devices(.current_devices, .max_devices))]
    DeviceCountExceeded {
        current_devices: Option<u32>,
        max_devices: Option<u32>,
    },

    /// Transport failure talking to the license server.
    #[error("network error: {0}")]
    Network(String),

    /// No usable offline proof.
    #[error("license cache expired: {0}; online validation required")]
    CacheExpired(CacheMiss),

    /// No stable hardware signal could be read on this machine.
    #[error("device identity unavailable: {0}")]
    DeviceIdentityUnavailable(String),

    /// License revoked.
    #[error("license has been revoked")]
    Revoked,

    /// This device was blocked by the license owner.
    #[error("this device has been blocked")]
    DeviceBlocked,

    /// Server rejected the license for a reason this client does not know.
    #[error("license validation failed: {0}")]
    Rejected(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local cache could not be written or removed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl LicenseError {
    /// Returns true for transport failures, which are eligible for offline fallback.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns true if a later attempt may succeed without user action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::CacheExpired(_))
    }

    /// Maps the error to the terminal state of the attempt that raised it.
    #[must_use]
    pub fn state(&self) -> ValidationState {
        match self {
            Self::InvalidLicenseKey
            | Self::LicenseExpired { .. }
            | Self::DeviceCountExceeded { .. }
            | Self::Revoked
            | Self::DeviceBlocked
            | Self::Rejected(_) => ValidationState::Invalid,
            Self::CacheExpired(CacheMiss::GraceElapsed | CacheMiss::ClockRewound) => {
                ValidationState::GraceExpired
            }
            Self::CacheExpired(_) => ValidationState::NetworkFailureNoCache,
            Self::Network(_)
            | Self::DeviceIdentityUnavailable(_)
            | Self::Config(_)
            | Self::Cache(_) => ValidationState::Error,
        }
    }
}

fn fmt_expiry(expires_at: &Option<DateTime<Utc>>) -> String {
    expires_at
        .map(|at| format!(" on {}", at.format("%Y-%m-%d")))
        .unwrap_or_default()
}

fn fmt_devices(current: &Option<u32>, max: &Option<u32>) -> String {
    match (*current, *max) {
        (Some(current), Some(max)) => format!(": {current}/{max} devices"),
        (None, Some(max)) => format!(" (max {max} devices)"),
        _ => String::new(),
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
