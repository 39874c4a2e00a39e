//! Core type definitions for Licensify.
//!
//! This crate defines the plain data shared by the client engine and the
//! host applications embedding it:
//! - License tiers and product metadata as reported by the license server
//! - The persisted license snapshot and the per-call validation result
//! - Terminal states of a validation attempt
//! - Whole-day arithmetic used for `days_remaining`
//!
//! Nothing here performs I/O.

mod days;
mod license;
mod result;

pub use days::{whole_days_between, whole_days_until};
pub use license::{LicenseSnapshot, LicenseType, ProductInfo};
pub use result::{ValidationResult, ValidationState};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown license type: {0}")]
    UnknownLicenseType(String),
}
