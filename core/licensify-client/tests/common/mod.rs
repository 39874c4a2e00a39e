//! Shared test helpers for the licensing client.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use licensify_client::{
    ActivateRequest, DeactivateRequest, DeviceIdentity, LicenseApi, LicenseConfig, LicenseError,
    LicenseResult, LicenseSnapshot, LicenseType, LicenseValidator, ManualClock, ProductInfo,
    ServerResponse, ValidateRequest,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const KEY: &str = "ABCD-0001";

/// Fixed reference instant `T`.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap()
}

pub fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

/// A license as the fake server stores it.
#[derive(Debug, Clone)]
pub struct ServerLicense {
    pub license_type: LicenseType,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_devices: u32,
    pub features: Vec<String>,
    pub product: Option<ProductInfo>,
    pub revoked: bool,
    pub blocked: BTreeSet<String>,
    pub devices: BTreeSet<String>,
}

impl ServerLicense {
    pub fn trial(expires_at: DateTime<Utc>) -> Self {
        Self {
            license_type: LicenseType::Trial,
            expires_at: Some(expires_at),
            max_devices: 0,
            features: vec!["export".to_string(), "Sync".to_string()],
            product: Some(ProductInfo {
                id: 7,
                name: "Acme Editor".to_string(),
                slug: "acme-editor".to_string(),
                version: Some("2.3.0".to_string()),
            }),
            revoked: false,
            blocked: BTreeSet::new(),
            devices: BTreeSet::new(),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            license_type: LicenseType::Unlimited,
            expires_at: None,
            ..Self::trial(t0())
        }
    }

    pub fn with_max_devices(mut self, max: u32) -> Self {
        self.max_devices = max;
        self
    }
}

/// In-memory license server with a connectivity switch.
#[derive(Default)]
pub struct FakeLicenseApi {
    licenses: Mutex<HashMap<String, ServerLicense>>,
    offline: AtomicBool,
    clock: Mutex<Option<ManualClock>>,
    scripted: Mutex<Option<ServerResponse>>,
    pub validate_calls: AtomicUsize,
    pub activate_calls: AtomicUsize,
    pub deactivate_calls: AtomicUsize,
}

impl FakeLicenseApi {
    pub fn new(clock: &ManualClock) -> Arc<Self> {
        let api = Self::default();
        *api.clock.lock().unwrap() = Some(clock.clone());
        Arc::new(api)
    }

    pub fn insert(&self, key: &str, license: ServerLicense) {
        self.licenses.lock().unwrap().insert(key.to_string(), license);
    }

    pub fn update(&self, key: &str, f: impl FnOnce(&mut ServerLicense)) {
        let mut licenses = self.licenses.lock().unwrap();
        f(licenses.get_mut(key).expect("unknown license"));
    }

    /// Answers every validate/activate call with `response`, bypassing the roster.
    pub fn respond_with(&self, response: ServerResponse) {
        *self.scripted.lock().unwrap() = Some(response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn devices(&self, key: &str) -> BTreeSet<String> {
        self.licenses.lock().unwrap()[key].devices.clone()
    }

    pub fn validate_count(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn activate_count(&self) -> usize {
        self.activate_calls.load(Ordering::SeqCst)
    }

    fn now(&self) -> DateTime<Utc> {
        match &*self.clock.lock().unwrap() {
            Some(clock) => licensify_client::Clock::now(clock),
            None => Utc::now(),
        }
    }

    fn check_online(&self) -> LicenseResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LicenseError::Network(
                "could not connect to license server".to_string(),
            ));
        }
        Ok(())
    }

    fn verdict(&self, key: &str, device_id: &str) -> ServerResponse {
        if let Some(response) = self.scripted.lock().unwrap().clone() {
            return response;
        }
        let now = self.now();
        let mut licenses = self.licenses.lock().unwrap();
        let Some(license) = licenses.get_mut(key) else {
            return ServerResponse::rejected("invalid_key");
        };
        if license.revoked {
            return ServerResponse::rejected("license_revoked");
        }
        if license.blocked.contains(device_id) {
            return ServerResponse::rejected("device_blocked");
        }
        if license.expires_at.is_some_and(|e| now > e) {
            return ServerResponse {
                expires_at: license.expires_at,
                ..ServerResponse::rejected("license_expired")
            };
        }
        if !license.devices.contains(device_id) {
            let full =
                license.max_devices > 0 && license.devices.len() as u32 >= license.max_devices;
            if full {
                return ServerResponse {
                    current_devices: Some(license.devices.len() as u32),
                    max_devices: Some(license.max_devices),
                    ..ServerResponse::rejected("device_limit_exceeded")
                };
            }
            license.devices.insert(device_id.to_string());
        }

        let snapshot = LicenseSnapshot {
            license_type: license.license_type,
            expires_at: license.expires_at,
            days_remaining: license
                .expires_at
                .map(|e| licensify_types::whole_days_until(e, now)),
            current_devices: license.devices.len() as u32,
            max_devices: license.max_devices,
            features: license.features.clone(),
            product: license.product.clone(),
        };
        ServerResponse::granted(&snapshot)
    }
}

#[async_trait]
impl LicenseApi for FakeLicenseApi {
    async fn validate(&self, request: &ValidateRequest) -> LicenseResult<ServerResponse> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.verdict(&request.license_key, &request.device_id))
    }

    async fn activate(&self, request: &ActivateRequest) -> LicenseResult<ServerResponse> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.verdict(&request.license_key, &request.device_id))
    }

    async fn deactivate(&self, request: &DeactivateRequest) -> LicenseResult<()> {
        self.deactivate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let mut licenses = self.licenses.lock().unwrap();
        match licenses.get_mut(&request.license_key) {
            Some(license) => {
                license.devices.remove(&request.device_id);
                Ok(())
            }
            None => Err(LicenseError::InvalidLicenseKey),
        }
    }
}

/// Client configuration with a 30-day grace period rooted at `cache_dir`.
pub fn config(cache_dir: &Path) -> LicenseConfig {
    LicenseConfig::new("http://licenses.invalid/api/v1/licenses", KEY)
        .with_cache_dir(cache_dir)
        .with_grace_period_days(30)
}

/// A validator for device `device_id`, wired to `api` and `clock`.
pub fn validator(
    api: &Arc<FakeLicenseApi>,
    clock: &ManualClock,
    cache_dir: &Path,
    device_id: &str,
) -> LicenseValidator {
    LicenseValidator::with_api(config(cache_dir), api.clone())
        .with_identity(DeviceIdentity::fixed(device_id))
        .with_clock(Arc::new(clock.clone()))
}

/// A license snapshot as the server would report it at `t0()`.
pub fn trial_snapshot(expires_at: DateTime<Utc>) -> LicenseSnapshot {
    LicenseSnapshot {
        license_type: LicenseType::Trial,
        expires_at: Some(expires_at),
        days_remaining: Some(licensify_types::whole_days_until(expires_at, t0())),
        current_devices: 1,
        max_devices: 3,
        features: vec!["export".to_string()],
        product: None,
    }
}
