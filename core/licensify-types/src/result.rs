//! Outcome of a single validation attempt.

use crate::days::whole_days_until;
use crate::license::{LicenseSnapshot, LicenseType, ProductInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal state of one validation attempt.
///
/// Every call re-enters the machine from `Idle`; nothing but the cache
/// carries over between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// The server confirmed the license.
    Valid,
    /// The server was unreachable and a cached proof is still honoured.
    ValidCached,
    /// The server was unreachable and the cached proof is past its deadline.
    GraceExpired,
    /// The server rejected the license.
    Invalid,
    /// The server was unreachable and there is no usable cached proof.
    NetworkFailureNoCache,
    /// Anything else (device identity, configuration, transport during activation).
    Error,
}

impl ValidationState {
    /// Returns true for the two states in which the host may unlock functionality.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Valid | Self::ValidCached)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::ValidCached => "valid_cached",
            Self::GraceExpired => "grace_expired",
            Self::Invalid => "invalid",
            Self::NetworkFailureNoCache => "network_failure_no_cache",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful validation, online or from cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub license_type: LicenseType,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<u32>,
    pub current_devices: u32,
    pub max_devices: u32,
    pub from_cache: bool,
    /// Offline deadline: the earlier of grace expiry and license expiry.
    pub cache_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub product: Option<ProductInfo>,
}

impl ValidationResult {
    /// Builds the result of a server-confirmed validation.
    ///
    /// The server's `days_remaining` is kept when present, otherwise it is
    /// derived from `expires_at`.
    #[must_use]
    pub fn online(
        license: LicenseSnapshot,
        now: DateTime<Utc>,
        cache_deadline: DateTime<Utc>,
    ) -> Self {
        let days_remaining = license
            .days_remaining
            .or_else(|| license.expires_at.map(|e| whole_days_until(e, now)));
        Self::assemble(license, days_remaining, false, cache_deadline)
    }

    /// Builds the result of an offline validation served from cache.
    ///
    /// `days_remaining` is recomputed relative to `now`; without an expiry
    /// date there is nothing to count down to and it is `None`.
    #[must_use]
    pub fn cached(
        license: LicenseSnapshot,
        now: DateTime<Utc>,
        cache_deadline: DateTime<Utc>,
    ) -> Self {
        let days_remaining = license
            .expires_at
            .map(|expires_at| whole_days_until(expires_at, now));
        Self::assemble(license, days_remaining, true, cache_deadline)
    }

    fn assemble(
        license: LicenseSnapshot,
        days_remaining: Option<u32>,
        from_cache: bool,
        cache_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            valid: true,
            license_type: license.license_type,
            expires_at: license.expires_at,
            days_remaining,
            current_devices: license.current_devices,
            max_devices: license.max_devices,
            from_cache,
            cache_expires_at: Some(cache_deadline),
            features: license.features,
            product: license.product,
        }
    }

    /// Returns the persistable part of this result.
    #[must_use]
    pub fn snapshot(&self) -> LicenseSnapshot {
        LicenseSnapshot {
            license_type: self.license_type,
            expires_at: self.expires_at,
            days_remaining: self.days_remaining,
            current_devices: self.current_devices,
            max_devices: self.max_devices,
            features: self.features.clone(),
            product: self.product.clone(),
        }
    }

    /// Returns the terminal state this result represents.
    #[must_use]
    pub fn state(&self) -> ValidationState {
        if self.from_cache {
            ValidationState::ValidCached
        } else {
            ValidationState::Valid
        }
    }

    /// Case-insensitive feature lookup.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f.eq_ignore_ascii_case(feature))
    }

    /// Returns true if the license allows unlimited devices.
    #[must_use]
    pub fn unlimited_devices(&self) -> bool {
        self.max_devices == 0
    }
}
