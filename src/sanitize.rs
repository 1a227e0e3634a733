//! Text sanitizer applied to every selection before it reaches a prompt.
//!
//! This is lossy character stripping plus truncation.  It is NOT an HTML
//! escaper and gives no injection guarantees: the stripped characters are
//! simply dropped, so `a < b` becomes `a  b`.

use serde_json::Value;

/// Maximum number of characters kept from a selection.
pub const MAX_TEXT_LENGTH: usize = 3000;

/// Characters removed from selections.
pub const STRIPPED_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

/// Sanitize an arbitrary JSON value.  Anything that is not a string yields
/// an empty string.
pub fn sanitize_value(value: &Value) -> String {
    match value {
        Value::String(s) => sanitize_text(s),
        _ => String::new(),
    }
}

/// Trim, truncate to [`MAX_TEXT_LENGTH`] characters, then drop
/// [`STRIPPED_CHARS`].  Stripping happens after truncation so the result
/// can only shrink below the limit.
pub fn sanitize_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .take(MAX_TEXT_LENGTH)
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect()
}
