//! License validation client for Licensify.
//!
//! This crate handles:
//! - Online validation and device activation against the license server
//! - Hardware fingerprinting for device binding
//! - Offline validation from a cached proof within a grace period
//! - Periodic background revalidation
//!
//! # Offline Trust
//!
//! Every successful online validation is cached together with the device
//! fingerprint and a hash of the key. When the server cannot be reached the
//! cached proof is honoured until the earlier of `fetched_at + grace_period`
//! and the license's own expiry. Rejections are never cached.
//!
//! # Example
//!
//! ```no_run
//! use licensify_client::{LicenseConfig, LicenseValidator};
//!
//! # async fn run() -> licensify_client::LicenseResult<()> {
//! let config = LicenseConfig::new("https://licenses.example.com/api/v1/licenses", "ABCD-0001")
//!     .with_app_version("2.3.0");
//! let validator = LicenseValidator::new(config)?;
//! if validator.is_valid().await {
//!     println!("licensed");
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod cache;
mod checker;
mod clock;
mod config;
mod device;
mod error;
mod keys;
mod validator;

pub use api::{
    ActivateRequest, DeactivateRequest, HttpLicenseApi, LicenseApi, ServerResponse,
    ValidateRequest,
};
pub use cache::{CACHE_FILENAME, CACHE_SCHEMA_VERSION, CacheEntry, CacheError, CacheInfo, CacheStore};
pub use checker::{BackgroundChecker, CheckerStatus, OutcomeCallback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_GRACE_PERIOD_DAYS, DEFAULT_TIMEOUT_SECS, LicenseConfig,
};
pub use device::{
    DeviceFingerprint, DeviceIdentity, DeviceInfo, HardwareSource, HostnameSource,
    MachineIdSource, PlatformSource, StaticSource,
};
pub use error::{CacheMiss, LicenseError, LicenseResult};
pub use keys::{hash_license_key, mask_license_key};
pub use validator::LicenseValidator;

pub use licensify_types::{
    LicenseSnapshot, LicenseType, ProductInfo, ValidationResult, ValidationState,
};
