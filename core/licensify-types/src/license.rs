//! License tiers and the license facts reported by the server.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The license tier (aligned with server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// No expiry, no feature restrictions.
    Unlimited,
    /// Limited-time evaluation.
    Trial,
    /// Time-limited paid license.
    Limited,
    /// Standard tier.
    Standard,
    /// Professional tier.
    Professional,
    /// Enterprise tier.
    Enterprise,
}

impl LicenseType {
    /// Returns the wire name of this tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unlimited => "unlimited",
            Self::Trial => "trial",
            Self::Limited => "limited",
            Self::Standard => "standard",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    /// Returns true for evaluation licenses.
    #[must_use]
    pub fn is_trial(&self) -> bool {
        matches!(self, Self::Trial)
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlimited" => Ok(Self::Unlimited),
            "trial" => Ok(Self::Trial),
            "limited" => Ok(Self::Limited),
            "standard" => Ok(Self::Standard),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(Error::UnknownLicenseType(other.to_string())),
        }
    }
}

/// Product the license belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// License facts from a successful server validation.
///
/// This is what gets persisted for offline use; the cache-derived fields of
/// [`crate::ValidationResult`] are recomputed on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSnapshot {
    pub license_type: LicenseType,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<u32>,
    pub current_devices: u32,
    /// Maximum activations. `0` means unlimited.
    pub max_devices: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub product: Option<ProductInfo>,
}

impl LicenseSnapshot {
    /// Returns true if the license has a hard expiry.
    #[must_use]
    pub fn is_time_limited(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Returns true if the license had lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Returns true if more devices are registered than the license allows.
    /// A `max_devices` of zero never exceeds.
    #[must_use]
    pub fn exceeds_device_limit(&self) -> bool {
        self.max_devices > 0 && self.current_devices > self.max_devices
    }
}
