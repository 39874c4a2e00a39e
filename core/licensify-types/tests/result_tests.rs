use chrono::{DateTime, Duration, TimeZone, Utc};
use licensify_types::{
    whole_days_until, LicenseSnapshot, LicenseType, ProductInfo, ValidationResult, ValidationState,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn trial_snapshot(expires_in_days: i64) -> LicenseSnapshot {
    LicenseSnapshot {
        license_type: LicenseType::Trial,
        expires_at: Some(t0() + Duration::days(expires_in_days)),
        days_remaining: Some(expires_in_days as u32),
        current_devices: 1,
        max_devices: 3,
        features: vec!["Export".to_string(), "api_access".to_string()],
        product: Some(ProductInfo {
            id: 7,
            name: "Absatzkalkulation".to_string(),
            slug: "absatzkalkulation".to_string(),
            version: Some("2.1.0".to_string()),
        }),
    }
}

// ── LicenseType ──────────────────────────────────────────────────

#[test]
fn license_type_wire_names() {
    assert_eq!(serde_json::to_string(&LicenseType::Unlimited).unwrap(), "\"unlimited\"");
    assert_eq!(serde_json::to_string(&LicenseType::Trial).unwrap(), "\"trial\"");
    assert_eq!(serde_json::to_string(&LicenseType::Limited).unwrap(), "\"limited\"");
}

#[test]
fn license_type_from_str_is_case_insensitive() {
    assert_eq!("TRIAL".parse::<LicenseType>().unwrap(), LicenseType::Trial);
    assert_eq!(" enterprise ".parse::<LicenseType>().unwrap(), LicenseType::Enterprise);
}

#[test]
fn license_type_unknown_rejected() {
    let err = "lifetime".parse::<LicenseType>().unwrap_err();
    assert!(err.to_string().contains("lifetime"));
    let licensify_types::Error::UnknownLicenseType(name) = err;
    assert_eq!(name, "lifetime");
}

// ── LicenseSnapshot ──────────────────────────────────────────────

#[test]
fn snapshot_expiry_boundary() {
    let snap = trial_snapshot(5);
    let expires_at = snap.expires_at.unwrap();
    assert!(!snap.is_expired_at(expires_at));
    assert!(snap.is_expired_at(expires_at + Duration::seconds(1)));
}

#[test]
fn zero_max_devices_never_exceeds() {
    let mut snap = trial_snapshot(5);
    snap.max_devices = 0;
    snap.current_devices = 500;
    assert!(!snap.exceeds_device_limit());

    snap.max_devices = 2;
    snap.current_devices = 3;
    assert!(snap.exceeds_device_limit());

    snap.current_devices = 2;
    assert!(!snap.exceeds_device_limit());
}

// ── ValidationResult ─────────────────────────────────────────────

#[test]
fn cached_result_recomputes_days() {
    let snap = trial_snapshot(5);
    let deadline = snap.expires_at.unwrap();
    let result = ValidationResult::cached(snap, t0() + Duration::days(2), deadline);
    assert!(result.valid);
    assert!(result.from_cache);
    assert_eq!(result.days_remaining, Some(3));
    assert_eq!(result.cache_expires_at, Some(deadline));
    assert_eq!(result.state(), ValidationState::ValidCached);
}

#[test]
fn cached_result_without_expiry_has_no_countdown() {
    let mut snap = trial_snapshot(5);
    snap.expires_at = None;
    snap.days_remaining = Some(5);
    let result = ValidationResult::cached(snap, t0() + Duration::days(2), t0() + Duration::days(30));
    assert!(result.from_cache);
    assert_eq!(result.days_remaining, None);
}

#[test]
fn online_result_keeps_server_days() {
    let mut snap = trial_snapshot(5);
    snap.days_remaining = Some(4);
    let result = ValidationResult::online(snap, t0(), t0() + Duration::days(5));
    assert_eq!(result.days_remaining, Some(4));
    assert!(!result.from_cache);
    assert_eq!(result.state(), ValidationState::Valid);
}

#[test]
fn online_result_derives_missing_days() {
    let mut snap = trial_snapshot(10);
    snap.days_remaining = None;
    let result = ValidationResult::online(snap, t0(), t0() + Duration::days(10));
    assert_eq!(result.days_remaining, Some(10));
}

#[test]
fn snapshot_roundtrip_through_result() {
    let snap = trial_snapshot(5);
    let result = ValidationResult::online(snap.clone(), t0(), t0() + Duration::days(5));
    assert_eq!(result.snapshot(), snap);
}

#[test]
fn feature_lookup_ignores_case() {
    let result = ValidationResult::online(trial_snapshot(5), t0(), t0() + Duration::days(5));
    assert!(result.has_feature("export"));
    assert!(result.has_feature("API_ACCESS"));
    assert!(!result.has_feature("admin"));
}

#[test]
fn usable_states() {
    assert!(ValidationState::Valid.is_usable());
    assert!(ValidationState::ValidCached.is_usable());
    assert!(!ValidationState::GraceExpired.is_usable());
    assert!(!ValidationState::Invalid.is_usable());
    assert!(!ValidationState::NetworkFailureNoCache.is_usable());
    assert!(!ValidationState::Error.is_usable());
}

#[test]
fn state_names_match_serde() {
    for state in [
        ValidationState::Valid,
        ValidationState::ValidCached,
        ValidationState::NetworkFailureNoCache,
    ] {
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, format!("\"{state}\""));
    }
}

// ── Day arithmetic ───────────────────────────────────────────────

proptest! {
    #[test]
    fn days_until_never_negative(offset_secs in -10_000_000i64..10_000_000i64) {
        let now = t0();
        let target = now + Duration::seconds(offset_secs);
        let days = whole_days_until(target, now);
        if offset_secs <= 0 {
            prop_assert_eq!(days, 0);
        } else {
            prop_assert_eq!(i64::from(days), offset_secs / 86_400);
        }
    }
}
