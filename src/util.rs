//! Shared helpers for the keywarden service.

use axum::http::HeaderMap;
use chrono::Utc;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Current unix timestamp in seconds.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Convert a (possibly fractional) day count to whole seconds, rounding to
/// the nearest second.
pub fn days_to_seconds(days: f64) -> i64 {
    (days * SECONDS_PER_DAY as f64).round() as i64
}

/// Convert whole seconds to fractional days.
pub fn seconds_to_days(seconds: i64) -> f64 {
    seconds as f64 / SECONDS_PER_DAY as f64
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Treat blank and whitespace-only strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Compare dotted numeric versions ("1.4.2"). Missing segments count as
/// zero; a segment that fails to parse fails the comparison.
pub fn version_at_least(candidate: &str, minimum: &str) -> bool {
    fn parse(s: &str) -> Option<Vec<u64>> {
        s.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    }

    let (Some(candidate), Some(minimum)) = (parse(candidate), parse(minimum)) else {
        return false;
    };

    for i in 0..candidate.len().max(minimum.len()) {
        let c = candidate.get(i).copied().unwrap_or(0);
        let m = minimum.get(i).copied().unwrap_or(0);
        if c != m {
            return c > m;
        }
    }
    true
}
