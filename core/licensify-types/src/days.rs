//! Whole-day arithmetic.
//!
//! Day counts surfaced to callers are whole days, rounded down, and never
//! negative.

use chrono::{DateTime, Utc};

/// Whole days from `now` until `target`, rounded down and floored at zero.
#[must_use]
pub fn whole_days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    whole_days_between(now, target)
}

/// Whole days elapsed between `from` and `to`, rounded down and floored at zero.
#[must_use]
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let days = (to - from).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}
