use chrono::{TimeZone, Utc};
use licensify_client::{CacheError, CacheMiss, LicenseError, ValidationState};

#[test]
fn error_display_invalid_key() {
    let err = LicenseError::InvalidLicenseKey;
    assert!(format!("{err}").contains("invalid license key"));
}

#[test]
fn error_display_expired_with_date() {
    let err = LicenseError::LicenseExpired {
        expires_at: Some(Utc.with_ymd_and_hms(2025, 1, 8, 15, 22, 0).unwrap()),
    };
    assert_eq!(format!("{err}"), "license expired on 2025-01-08");
}

#[test]
fn error_display_expired_without_date() {
    let err = LicenseError::LicenseExpired { expires_at: None };
    assert_eq!(format!("{err}"), "license expired");
}

#[test]
fn error_display_device_limit() {
    let err = LicenseError::DeviceCountExceeded {
        current_devices: Some(3),
        max_devices: Some(3),
    };
    let msg = format!("{err}");
    assert!(msg.contains("device limit"));
    assert!(msg.contains("3/3"));

    let err = LicenseError::DeviceCountExceeded {
        current_devices: None,
        max_devices: Some(5),
    };
    assert!(format!("{err}").contains("max 5"));
}

#[test]
fn error_display_network() {
    let err = LicenseError::Network("request timed out".into());
    let msg = format!("{err}");
    assert!(msg.contains("network error"));
    assert!(msg.contains("timed out"));
}

#[test]
fn error_display_cache_expired() {
    let err = LicenseError::CacheExpired(CacheMiss::GraceElapsed);
    let msg = format!("{err}");
    assert!(msg.contains("grace period"));
    assert!(msg.contains("online validation required"));
}

#[test]
fn error_display_rejected_reason() {
    let err = LicenseError::Rejected("product_mismatch".into());
    assert!(format!("{err}").contains("product_mismatch"));
}

#[test]
fn error_display_revoked_and_blocked() {
    assert!(format!("{}", LicenseError::Revoked).contains("revoked"));
    assert!(format!("{}", LicenseError::DeviceBlocked).contains("blocked"));
}

#[test]
fn cache_error_converts() {
    let err: LicenseError = CacheError::Io("permission denied".into()).into();
    assert!(matches!(err, LicenseError::Cache(ref msg) if msg.contains("permission denied")));
}

// ── Classification ──────────────────────────────────────────────

#[test]
fn only_network_errors_fall_back() {
    assert!(LicenseError::Network("x".into()).is_network());
    assert!(!LicenseError::InvalidLicenseKey.is_network());
    assert!(!LicenseError::CacheExpired(CacheMiss::NotFound).is_network());
}

#[test]
fn rejections_are_not_retryable() {
    assert!(!LicenseError::InvalidLicenseKey.is_retryable());
    assert!(!LicenseError::Revoked.is_retryable());
    assert!(LicenseError::Network("x".into()).is_retryable());
    assert!(LicenseError::CacheExpired(CacheMiss::GraceElapsed).is_retryable());
}

#[test]
fn errors_map_to_terminal_states() {
    let cases = [
        (LicenseError::InvalidLicenseKey, ValidationState::Invalid),
        (
            LicenseError::LicenseExpired { expires_at: None },
            ValidationState::Invalid,
        ),
        (LicenseError::DeviceBlocked, ValidationState::Invalid),
        (
            LicenseError::CacheExpired(CacheMiss::NotFound),
            ValidationState::NetworkFailureNoCache,
        ),
        (
            LicenseError::CacheExpired(CacheMiss::Corrupt),
            ValidationState::NetworkFailureNoCache,
        ),
        (
            LicenseError::CacheExpired(CacheMiss::DeviceMismatch),
            ValidationState::NetworkFailureNoCache,
        ),
        (
            LicenseError::CacheExpired(CacheMiss::GraceElapsed),
            ValidationState::GraceExpired,
        ),
        (
            LicenseError::CacheExpired(CacheMiss::ClockRewound),
            ValidationState::GraceExpired,
        ),
        (
            LicenseError::DeviceIdentityUnavailable("none".into()),
            ValidationState::Error,
        ),
        (LicenseError::Config("x".into()), ValidationState::Error),
    ];
    for (err, state) in cases {
        assert_eq!(err.state(), state, "{err:?}");
    }
}

#[test]
fn error_is_cloneable_for_status_reports() {
    let err = LicenseError::Network("down".into());
    assert_eq!(err.clone(), err);
}
