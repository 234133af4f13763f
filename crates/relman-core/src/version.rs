//! Date-based release version numbering.
//!
//! Versions look like `2024.1015.3`: year, then month (unpadded) and day
//! (two digits), then a per-day counter.

use chrono::NaiveDate;

/// Version prefix for `date`, including the trailing dot.
pub fn version_base(date: NaiveDate) -> String {
    date.format("%Y.%-m%d.").to_string()
}

/// Compute the version for a release cut on `today`.
///
/// When `last_tag` was cut the same day, its counter is carried over and
/// bumped by one if `increment` is set. Otherwise, or if the counter cannot
/// be bumped any further, it starts at zero.
pub fn next_version(last_tag: Option<&str>, today: NaiveDate, increment: bool) -> String {
    let base = version_base(today);

    let counter = last_tag
        .and_then(|tag| tag.strip_prefix(&base))
        .and_then(|rest| rest.split('.').next())
        .and_then(|n| n.parse::<u32>().ok())
        .and_then(|n| n.checked_add(u32::from(increment)))
        .unwrap_or(0);

    format!("{base}{counter}")
}
