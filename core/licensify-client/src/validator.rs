//! License validator. One validation attempt per call.
//!
//! Online first. On a transport failure the last successful validation is
//! read back from the cache and honoured until the cache deadline: the
//! earlier of `fetched_at + grace_period` and the license's own expiry.
//! Negative verdicts are never cached, so a later server-side fix (renewal,
//! freed device slot) takes effect on the next online check.

use crate::api::{ActivateRequest, DeactivateRequest, HttpLicenseApi, LicenseApi, ValidateRequest};
use crate::cache::{CacheEntry, CacheError, CacheInfo, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::device::{DeviceFingerprint, DeviceIdentity, DeviceInfo};
use crate::error::{CacheMiss, LicenseError, LicenseResult};
use crate::keys::mask_license_key;
use chrono::{DateTime, Utc};
use licensify_types::{LicenseSnapshot, ProductInfo, ValidationResult};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Validates a license against the server, with offline fallback.
///
/// Shareable across threads and tasks (`Arc<LicenseValidator>`); locks are
/// only held for short reads and writes, never across the network call.
pub struct LicenseValidator {
    config: LicenseConfig,
    api: Arc<dyn LicenseApi>,
    cache: CacheStore,
    identity: Arc<DeviceIdentity>,
    clock: Arc<dyn Clock>,
    device_info: DeviceInfo,
    /// Key used for validation; replaced by a successful `activate`.
    active_key: RwLock<String>,
    last: RwLock<LastOutcome>,
}

/// What the most recent validation attempt concluded.
#[derive(Debug, Clone, Default)]
enum LastOutcome {
    /// No conclusive attempt yet, or the memo was cleared.
    #[default]
    Unknown,
    Granted(ValidationResult),
    /// Rejected by the server or refused offline. Cached proofs no longer count.
    Denied,
}

impl LicenseValidator {
    /// Creates a validator talking HTTP to `config.api_url`, fingerprinting
    /// the real machine and reading the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] for an invalid configuration.
    pub fn new(config: LicenseConfig) -> LicenseResult<Self> {
        let config = config.validate()?;
        let api = HttpLicenseApi::new(&config)?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Creates a validator with a custom remote service.
    ///
    /// The configuration is used as given; call [`LicenseConfig::validate`]
    /// first if it comes from user input.
    pub fn with_api(config: LicenseConfig, api: Arc<dyn LicenseApi>) -> Self {
        let cache = CacheStore::new(config.resolved_cache_dir());
        let active_key = RwLock::new(config.license_key.trim().to_string());
        Self {
            config,
            api,
            cache,
            identity: Arc::new(DeviceIdentity::system()),
            clock: Arc::new(SystemClock),
            device_info: DeviceInfo::collect(),
            active_key,
            last: RwLock::new(LastOutcome::Unknown),
        }
    }

    /// Replaces the device identity.
    #[must_use]
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Moves the cache to `dir`.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.cache = CacheStore::new(dir);
        self
    }

    /// Replaces the device information reported on activation.
    #[must_use]
    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.device_info = info;
        self
    }

    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// The key currently being validated.
    pub fn license_key(&self) -> String {
        self.active_key
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The device fingerprint sent to the server.
    ///
    /// # Errors
    ///
    /// [`LicenseError::DeviceIdentityUnavailable`] if the machine cannot be fingerprinted.
    pub fn device_id(&self) -> LicenseResult<DeviceFingerprint> {
        self.identity.fingerprint()
    }

    // ── Validation ───────────────────────────────────────────────

    /// Validates the license, falling back to the cache on network failure.
    ///
    /// # Errors
    ///
    /// Server rejections propagate as their [`LicenseError`] kind. A network
    /// failure without an honoured cache entry is
    /// [`LicenseError::CacheExpired`].
    pub async fn validate(&self) -> LicenseResult<ValidationResult> {
        let outcome = self.validate_with_fallback().await;
        self.record(&outcome);
        outcome
    }

    async fn validate_with_fallback(&self) -> LicenseResult<ValidationResult> {
        let fingerprint = self.identity.fingerprint()?;
        let key = self.license_key();

        match self.validate_remote(&key, &fingerprint).await {
            Err(err) if err.is_network() => {
                warn!(
                    key = %mask_license_key(&key),
                    error = %err,
                    "online validation failed, trying offline cache"
                );
                self.validate_offline(&key, &fingerprint)
            }
            other => other,
        }
    }

    /// Validates against the server only; network failures propagate.
    ///
    /// # Errors
    ///
    /// Any [`LicenseError`], including [`LicenseError::Network`].
    pub async fn validate_online(&self) -> LicenseResult<ValidationResult> {
        let outcome = match self.identity.fingerprint() {
            Ok(fingerprint) => {
                self.validate_remote(&self.license_key(), &fingerprint)
                    .await
            }
            Err(err) => Err(err),
        };
        self.record(&outcome);
        outcome
    }

    /// Returns true only if the license is valid online or from cache.
    /// Never fails.
    pub async fn is_valid(&self) -> bool {
        match self.validate().await {
            Ok(result) => result.valid,
            Err(err) => {
                debug!(error = %err, state = ?err.state(), "license not valid");
                false
            }
        }
    }

    async fn validate_remote(
        &self,
        key: &str,
        fingerprint: &DeviceFingerprint,
    ) -> LicenseResult<ValidationResult> {
        let request = ValidateRequest {
            license_key: key.to_string(),
            device_id: fingerprint.id().to_string(),
            app_version: self.config.app_version.clone(),
            device_name: Some(self.device_info.device_name.clone()),
            os_info: Some(self.device_info.os_label()),
        };
        let response = self.api.validate(&request).await?;
        let snapshot = response.into_snapshot()?;
        let result = self.accept(key, fingerprint, snapshot)?;
        debug!(
            key = %mask_license_key(key),
            license_type = %result.license_type,
            days_remaining = ?result.days_remaining,
            "license validated online"
        );
        Ok(result)
    }

    /// Applies local policy to a positive verdict, then persists it.
    fn accept(
        &self,
        key: &str,
        fingerprint: &DeviceFingerprint,
        snapshot: LicenseSnapshot,
    ) -> LicenseResult<ValidationResult> {
        let now = self.clock.now();

        if snapshot.is_expired_at(now) {
            return Err(LicenseError::LicenseExpired {
                expires_at: snapshot.expires_at,
            });
        }
        if snapshot.exceeds_device_limit() {
            return Err(LicenseError::DeviceCountExceeded {
                current_devices: Some(snapshot.current_devices),
                max_devices: Some(snapshot.max_devices),
            });
        }

        let entry = CacheEntry::new(snapshot, now, key, fingerprint.clone());
        let deadline = entry.deadline(self.config.grace_period());
        if let Err(err) = self.cache.save(&entry) {
            warn!(error = %err, "failed to persist license cache");
        }

        Ok(ValidationResult::online(entry.license, now, deadline))
    }

    fn validate_offline(
        &self,
        key: &str,
        fingerprint: &DeviceFingerprint,
    ) -> LicenseResult<ValidationResult> {
        let entry = match self.cache.load(key) {
            Ok(entry) => entry,
            Err(CacheError::NotFound) => {
                return Err(LicenseError::CacheExpired(CacheMiss::NotFound));
            }
            Err(err) => {
                warn!(error = %err, "ignoring unusable license cache");
                return Err(LicenseError::CacheExpired(CacheMiss::Corrupt));
            }
        };

        let result = self.honour(entry, fingerprint, self.clock.now())?;
        info!(
            key = %mask_license_key(key),
            cache_expires_at = ?result.cache_expires_at,
            days_remaining = ?result.days_remaining,
            "license validated from offline cache"
        );
        Ok(result)
    }

    /// Decides whether a cache entry is still honoured at `now`.
    fn honour(
        &self,
        entry: CacheEntry,
        fingerprint: &DeviceFingerprint,
        now: DateTime<Utc>,
    ) -> LicenseResult<ValidationResult> {
        if entry.device_fingerprint != *fingerprint {
            return Err(LicenseError::CacheExpired(CacheMiss::DeviceMismatch));
        }
        // The trusted window is [fetched_at, deadline].
        if now < entry.fetched_at {
            return Err(LicenseError::CacheExpired(CacheMiss::ClockRewound));
        }
        let deadline = entry.deadline(self.config.grace_period());
        if now > deadline {
            return Err(LicenseError::CacheExpired(CacheMiss::GraceElapsed));
        }
        Ok(ValidationResult::cached(entry.license, now, deadline))
    }

    /// Updates the memo. A network failure says nothing about the license
    /// and leaves it untouched; any other failure denies it.
    fn record(&self, outcome: &LicenseResult<ValidationResult>) {
        let next = match outcome {
            Ok(result) => LastOutcome::Granted(result.clone()),
            Err(err) if err.is_network() => return,
            Err(_) => LastOutcome::Denied,
        };
        *self.last.write().unwrap_or_else(|p| p.into_inner()) = next;
    }

    fn last(&self) -> LastOutcome {
        self.last.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    // ── Activation ───────────────────────────────────────────────

    /// Registers this device for `license_key` with the server.
    ///
    /// Never served from cache. On success the result is cached and
    /// `license_key` becomes the key used by later validations.
    ///
    /// # Errors
    ///
    /// Any [`LicenseError`]; network failures propagate without offline fallback.
    pub async fn activate(&self, license_key: &str) -> LicenseResult<ValidationResult> {
        let key = license_key.trim();
        if key.is_empty() {
            return Err(LicenseError::InvalidLicenseKey);
        }
        let outcome = self.activate_remote(key).await;
        self.record(&outcome);
        outcome
    }

    async fn activate_remote(&self, key: &str) -> LicenseResult<ValidationResult> {
        let fingerprint = self.identity.fingerprint()?;

        let request = ActivateRequest {
            license_key: key.to_string(),
            device_id: fingerprint.id().to_string(),
            device_name: self.device_info.device_name.clone(),
            os: self.device_info.os_label(),
            app_version: self.config.app_version.clone(),
        };
        let response = self.api.activate(&request).await?;
        let snapshot = response.into_snapshot()?;
        let result = self.accept(key, &fingerprint, snapshot)?;

        *self.active_key.write().unwrap_or_else(|p| p.into_inner()) = key.to_string();
        info!(
            key = %mask_license_key(key),
            device = %fingerprint.short(),
            "license activated on this device"
        );
        Ok(result)
    }

    /// Releases this device's activation slot and clears the local cache.
    ///
    /// # Errors
    ///
    /// Network failures and server rejections propagate; the cache is only
    /// cleared after the server confirmed.
    pub async fn deactivate(&self) -> LicenseResult<()> {
        let fingerprint = self.identity.fingerprint()?;
        let key = self.license_key();
        let request = DeactivateRequest {
            license_key: key.clone(),
            device_id: fingerprint.id().to_string(),
        };
        self.api.deactivate(&request).await?;
        self.clear_cache()?;
        info!(key = %mask_license_key(&key), "license deactivated on this device");
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The most recent successful validation, unless a later attempt was
    /// rejected or refused offline.
    pub fn last_result(&self) -> Option<ValidationResult> {
        match self.last() {
            LastOutcome::Granted(result) => Some(result),
            LastOutcome::Unknown | LastOutcome::Denied => None,
        }
    }

    /// License information without contacting the server: the last online
    /// result while its cache deadline holds, or a cached validation that is
    /// still honoured. `None` once the license was rejected.
    pub fn license_info(&self) -> Option<ValidationResult> {
        let now = self.clock.now();
        match self.last() {
            LastOutcome::Denied => None,
            LastOutcome::Granted(result) if !result.from_cache => result
                .cache_expires_at
                .is_none_or(|deadline| now <= deadline)
                .then_some(result),
            LastOutcome::Granted(_) | LastOutcome::Unknown => {
                let fingerprint = self.identity.fingerprint().ok()?;
                let entry = self.cache.load(&self.license_key()).ok()?;
                self.honour(entry, &fingerprint, now).ok()
            }
        }
    }

    /// Enabled features of the license.
    pub fn features(&self) -> Vec<String> {
        self.license_info()
            .map(|info| info.features)
            .unwrap_or_default()
    }

    /// Case-insensitive feature check.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.license_info()
            .is_some_and(|info| info.has_feature(feature))
    }

    /// Product the license belongs to.
    pub fn product(&self) -> Option<ProductInfo> {
        self.license_info().and_then(|info| info.product)
    }

    /// Cache metadata for the active key.
    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.cache
            .info(&self.license_key(), self.config.grace_period())
    }

    /// Removes the cached validation and forgets the last result.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Cache`] if the cache file cannot be removed.
    pub fn clear_cache(&self) -> LicenseResult<()> {
        self.cache.clear()?;
        *self.last.write().unwrap_or_else(|p| p.into_inner()) = LastOutcome::Unknown;
        Ok(())
    }
}

impl std::fmt::Debug for LicenseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseValidator")
            .field("api_url", &self.config.api_url)
            .field("license_key", &mask_license_key(&self.license_key()))
            .field("cache", &self.cache.path())
            .finish()
    }
}
