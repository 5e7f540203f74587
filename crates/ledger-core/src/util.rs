//! Small helpers shared by config parsing, the REST client and the engine.

use std::time::Duration;

/// Longest remote error body kept in messages
const MAX_ERROR_TEXT_CHARS: usize = 180;

/// Trim optional text; blank values become `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Whether the value is an `http://` or `https://` URL with something after the scheme.
pub fn is_http_url(value: &str) -> bool {
    ["https://", "http://"]
        .iter()
        .find_map(|scheme| value.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty())
}

/// Collapse whitespace and cap the length of a remote error body.
pub fn compact_text(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_ERROR_TEXT_CHARS).collect()
}

/// Wall clock in Unix milliseconds
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `now` moved back by `window`, saturating at the epoch.
pub fn millis_before(now: i64, window: Duration) -> i64 {
    let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(window).max(0)
}
