//! Wall-clock time helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

/// Normalize a provider feed time to milliseconds.
///
/// Values below 10^11 are taken as seconds (a seconds-epoch crosses 10^11 only
/// in the year 5138), anything else as milliseconds. Zero maps to the local
/// clock.
pub fn epoch_to_ms(raw: u64) -> u64 {
    match raw {
        0 => now_ms(),
        r if r < 100_000_000_000 => r * 1000,
        r => r,
    }
}
