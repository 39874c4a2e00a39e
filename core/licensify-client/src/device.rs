//! Device fingerprinting for license binding.
//!
//! Generates a stable hardware fingerprint that identifies this device.
//! Used to bind activations to specific machines and to make casual key
//! sharing harder. It is not a security boundary against a local user who
//! can run code on the machine.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;

/// Domain separator mixed into every fingerprint digest.
const FINGERPRINT_DOMAIN: &str = "licensify-device-v1";

/// One local attribute that contributes to the fingerprint.
pub trait HardwareSource: Send + Sync {
    /// Stable name of the attribute, part of the digest input.
    fn name(&self) -> &'static str;

    /// Whether this attribute identifies the machine on its own.
    ///
    /// At least one identifying source must yield a value for a fingerprint
    /// to be produced.
    fn is_identifying(&self) -> bool {
        true
    }

    /// Reads the attribute, or `None` if it is not available here.
    fn read(&self) -> Option<String>;
}

/// Platform machine identifier (`/etc/machine-id`, `IOPlatformUUID`, `MachineGuid`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineIdSource;

impl HardwareSource for MachineIdSource {
    fn name(&self) -> &'static str {
        "machine_id"
    }

    fn read(&self) -> Option<String> {
        get_machine_id().filter(|id| !id.is_empty())
    }
}

/// Host name. Fallback identity when no machine id is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameSource;

impl HardwareSource for HostnameSource {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn read(&self) -> Option<String> {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
    }
}

/// OS family and CPU architecture. Salt only, never sufficient on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSource;

impl HardwareSource for PlatformSource {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn is_identifying(&self) -> bool {
        false
    }

    fn read(&self) -> Option<String> {
        Some(format!("{}-{}", env::consts::OS, env::consts::ARCH))
    }
}

/// A fixed value supplied by the host (containers, provisioning, tests).
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: &'static str,
    value: Option<String>,
}

impl StaticSource {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
        }
    }

    /// A source that never yields a value.
    #[must_use]
    pub fn unavailable(name: &'static str) -> Self {
        Self { name, value: None }
    }
}

impl HardwareSource for StaticSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self) -> Option<String> {
        self.value.clone()
    }
}

/// A stable fingerprint that identifies this device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Wraps an already computed fingerprint (e.g. read back from the cache).
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the fingerprint ID (hex SHA-256).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Short form for display.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self.0.len().min(16);
        &self.0[..end]
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the device fingerprint from a set of hardware sources.
pub struct DeviceIdentity {
    sources: Vec<Box<dyn HardwareSource>>,
}

impl DeviceIdentity {
    /// The default source set for the current platform: machine id, host
    /// name and platform.
    #[must_use]
    pub fn system() -> Self {
        Self::with_sources(vec![
            Box::new(MachineIdSource),
            Box::new(HostnameSource),
            Box::new(PlatformSource),
        ])
    }

    /// Uses a custom source set. Order matters: it is part of the digest input.
    #[must_use]
    pub fn with_sources(sources: Vec<Box<dyn HardwareSource>>) -> Self {
        Self { sources }
    }

    /// A fixed identity, for hosts that provision their own device id.
    pub fn fixed(device_id: impl Into<String>) -> Self {
        Self::with_sources(vec![Box::new(StaticSource::new("device_id", device_id))])
    }

    /// Computes the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::DeviceIdentityUnavailable`] if no identifying
    /// source yields a value.
    pub fn fingerprint(&self) -> LicenseResult<DeviceFingerprint> {
        let mut components = Vec::with_capacity(self.sources.len() + 1);
        components.push(FINGERPRINT_DOMAIN.to_string());
        let mut identifying = 0usize;

        for source in &self.sources {
            if let Some(value) = source.read() {
                if source.is_identifying() {
                    identifying += 1;
                }
                components.push(format!("{}={}", source.name(), value));
            }
        }

        if identifying == 0 {
            return Err(LicenseError::DeviceIdentityUnavailable(
                "no stable hardware identifier could be read".to_string(),
            ));
        }

        let digest = Sha256::digest(components.join("|").as_bytes());
        Ok(DeviceFingerprint(hex::encode(digest)))
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("DeviceIdentity").field("sources", &names).finish()
    }
}

/// Information about the current device, sent on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hostname.
    pub device_name: String,
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            device_name: HostnameSource.read().unwrap_or_else(|| "unknown".to_string()),
            os_name: env::consts::OS.to_string(),
            os_version: get_os_version(),
            arch: env::consts::ARCH.to_string(),
        }
    }

    /// Human-readable OS label, e.g. `linux 24.04`.
    #[must_use]
    pub fn os_label(&self) -> String {
        format!("{} {}", self.os_name, self.os_version)
    }
}

/// Gets the OS version string.
fn get_os_version() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "ver"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("VERSION_ID="))
                    .map(|l| {
                        l.trim_start_matches("VERSION_ID=")
                            .trim_matches('"')
                            .to_string()
                    })
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        "unknown".to_string()
    }
}

/// Gets the machine ID (platform-specific unique identifier).
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("MachineGuid"))
                    .and_then(|l| l.split_whitespace().last())
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
