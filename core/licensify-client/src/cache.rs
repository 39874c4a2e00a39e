//! Durable storage of the last successful validation.
//!
//! One cache file per installation. The entry is wrapped in a versioned
//! envelope with a checksum so that files from other releases, truncated
//! writes or hand edits are detected and discarded instead of misparsed.
//! Writes go to a uniquely named temp file in the same directory which is
//! then renamed over the cache file, so readers only ever see a complete
//! file, even with several writers racing.

use crate::device::DeviceFingerprint;
use crate::error::LicenseError;
use crate::keys::{hash_license_key, mask_license_key};
use chrono::{DateTime, TimeDelta, Utc};
use licensify_types::LicenseSnapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the cache file inside the cache directory.
pub const CACHE_FILENAME: &str = "license_cache.json";

/// Current on-disk schema version.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Errors from the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No entry stored for this license key.
    #[error("no cache entry")]
    NotFound,

    /// The stored data is unreadable, tampered with, or from another version.
    #[error("cache corrupt: {0}")]
    Corrupt(String),

    /// Filesystem error.
    #[error("cache I/O error: {0}")]
    Io(String),
}

impl From<CacheError> for LicenseError {
    fn from(err: CacheError) -> Self {
        LicenseError::Cache(err.to_string())
    }
}

/// A successful validation as persisted for offline use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub license: LicenseSnapshot,
    pub fetched_at: DateTime<Utc>,
    pub license_key_hash: String,
    pub device_fingerprint: DeviceFingerprint,
}

impl CacheEntry {
    pub fn new(
        license: LicenseSnapshot,
        fetched_at: DateTime<Utc>,
        license_key: &str,
        device_fingerprint: DeviceFingerprint,
    ) -> Self {
        Self {
            license,
            fetched_at,
            license_key_hash: hash_license_key(license_key),
            device_fingerprint,
        }
    }

    /// The true boundary of offline trust: the earlier of grace expiry and
    /// license expiry.
    #[must_use]
    pub fn deadline(&self, grace_period: TimeDelta) -> DateTime<Utc> {
        let grace_end = self
            .fetched_at
            .checked_add_signed(grace_period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match self.license.expires_at {
            Some(expires_at) => grace_end.min(expires_at),
            None => grace_end,
        }
    }

    /// Returns true if this entry was recorded for `license_key`.
    #[must_use]
    pub fn is_for_key(&self, license_key: &str) -> bool {
        self.license_key_hash == hash_license_key(license_key)
    }

    fn checksum(&self) -> Result<String, CacheError> {
        let canonical =
            serde_json::to_vec(self).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}

/// Debugging view of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub key_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub cache_deadline: DateTime<Utc>,
    pub device_fingerprint: String,
    pub path: PathBuf,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    schema_version: u32,
    checksum: String,
    entry: &'a CacheEntry,
}

#[derive(Deserialize)]
struct CacheFile {
    checksum: String,
    entry: CacheEntry,
}

#[derive(Deserialize)]
struct SchemaHeader {
    schema_version: Option<u32>,
}

/// File-backed cache with a single slot.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    path: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `dir`. Nothing is touched until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(CACHE_FILENAME);
        Self { dir, path }
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the entry for `license_key`.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotFound`] if nothing is stored or the stored entry is
    /// for another key, [`CacheError::Corrupt`] if the file cannot be
    /// trusted, [`CacheError::Io`] if it cannot be read.
    pub fn load(&self, license_key: &str) -> Result<CacheEntry, CacheError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::NotFound),
            Err(e) => return Err(CacheError::Io(e.to_string())),
        };

        let header: SchemaHeader = serde_json::from_slice(&raw)
            .map_err(|e| CacheError::Corrupt(format!("unreadable cache file: {e}")))?;
        match header.schema_version {
            Some(CACHE_SCHEMA_VERSION) => {}
            Some(other) => {
                return Err(CacheError::Corrupt(format!(
                    "unsupported schema version {other}"
                )));
            }
            None => return Err(CacheError::Corrupt("missing schema version".to_string())),
        }

        let file: CacheFile = serde_json::from_slice(&raw)
            .map_err(|e| CacheError::Corrupt(format!("malformed cache entry: {e}")))?;
        if file.entry.checksum()? != file.checksum {
            return Err(CacheError::Corrupt("checksum mismatch".to_string()));
        }

        if !file.entry.is_for_key(license_key) {
            debug!(
                key = %mask_license_key(license_key),
                "cache entry belongs to another license key"
            );
            return Err(CacheError::NotFound);
        }

        Ok(file.entry)
    }

    /// Atomically replaces the stored entry.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if the directory or file cannot be written.
    pub fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io(e.to_string()))?;

        let envelope = CacheFileRef {
            schema_version: CACHE_SCHEMA_VERSION,
            checksum: entry.checksum()?,
            entry,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| CacheError::Io(format!("serialize cache: {e}")))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".license_cache")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::Io(e.to_string()))?;
        tmp.write_all(&bytes)
            .map_err(|e| CacheError::Io(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::Io(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::Io(e.error.to_string()))?;

        debug!(path = %self.path.display(), "license cache written");
        Ok(())
    }

    /// Removes any stored entry. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "license cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to clear license cache");
                Err(CacheError::Io(e.to_string()))
            }
        }
    }

    /// Returns cache metadata for `license_key`, if a trusted entry exists.
    #[must_use]
    pub fn info(&self, license_key: &str, grace_period: TimeDelta) -> Option<CacheInfo> {
        let entry = self.load(license_key).ok()?;
        Some(CacheInfo {
            key_hash: mask_license_key(&entry.license_key_hash),
            fetched_at: entry.fetched_at,
            cache_deadline: entry.deadline(grace_period),
            device_fingerprint: entry.device_fingerprint.short().to_string(),
            path: self.path.clone(),
        })
    }
}
