//! License key helpers. Raw keys never reach disk or logs.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a license key, used to bind cache entries to a key.
#[must_use]
pub fn hash_license_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.trim().as_bytes()))
}

/// Masks a license key for display: the first 8 characters followed by `...`.
#[must_use]
pub fn mask_license_key(key: &str) -> String {
    const VISIBLE: usize = 8;
    let key = key.trim();
    if key.chars().count() <= VISIBLE {
        return key.to_string();
    }
    let visible: String = key.chars().take(VISIBLE).collect();
    format!("{visible}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_prefix() {
        assert_eq!(mask_license_key("TwHPwaICcgyS2cme"), "TwHPwaIC...");
        assert_eq!(mask_license_key("SHORT"), "SHORT");
        assert_eq!(mask_license_key(""), "");
    }

    #[test]
    fn hash_ignores_surrounding_whitespace() {
        assert_eq!(hash_license_key(" ABCD-0001 "), hash_license_key("ABCD-0001"));
        assert_ne!(hash_license_key("ABCD-0001"), hash_license_key("ABCD-0002"));
        assert_eq!(hash_license_key("ABCD-0001").len(), 64);
    }
}
