//! Normalization of the API's heterogeneous date-time strings.
//!
//! DataJud emits loosely RFC 3339-shaped timestamps, sometimes with a bare
//! `Z` suffix and sometimes with a fractional-seconds run longer than the
//! six digits a microsecond-precision parse accepts. Normalization truncates
//! excess precision, rewrites `Z` as `+00:00`, and parses to a UTC instant.
//! Failure is a value, not a panic: callers order unparseable movements via
//! [`or_sentinel`] so they sort oldest instead of crashing comparisons.

use chrono::{DateTime, Utc};

/// Parse an API date-time string into a UTC instant.
///
/// Returns `None` for anything that does not parse after normalization.
pub fn normalize_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let canonical = canonicalize(raw);
    DateTime::parse_from_rfc3339(&canonical)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Substitute the minimum UTC instant for an unparseable timestamp.
///
/// Used when ordering movements by event time: an unknown instant sorts
/// last (oldest), never panics a comparison.
pub fn or_sentinel(instant: Option<DateTime<Utc>>) -> DateTime<Utc> {
    instant.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn canonicalize(raw: &str) -> String {
    let mut out = match raw.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => raw.to_string(),
    };
    // Truncate a fractional-seconds run to microsecond precision.
    if let Some(dot) = out.find('.') {
        let frac_start = dot + 1;
        let frac_len = out[frac_start..]
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if frac_len > 6 {
            out.replace_range(frac_start + 6..frac_start + frac_len, "");
        }
    }
    out
}
