//! Shared JSON parsing helpers used by all provider adapters.
//!
//! Providers are inconsistent about numeric encoding: the same field may be a
//! JSON string (`"2501.35"`) or a native number (`2501.35`) depending on the
//! feed and even the message. These helpers accept both.

use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field on a JSON object as `u64` (string or number).
#[inline]
pub fn parse_u64_field(v: &Value, key: &str) -> Option<u64> {
    parse_str_u64(v.get(key))
}

/// Read a string field.
#[inline]
pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Absolute and percent change from a last price and a reference close.
///
/// Returns `(None, None)` when the close is missing or non-positive.
pub fn change_from_close(price: f64, close: Option<f64>) -> (Option<f64>, Option<f64>) {
    match close {
        Some(c) if c > 0.0 => {
            let change = price - c;
            (Some(change), Some(change / c * 100.0))
        }
        _ => (None, None),
    }
}
