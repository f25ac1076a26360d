use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_FILENAME_BYTES: usize = 255;
const FILENAME_REPLACEMENT: &str = "!";

static RESERVED_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]+"#).expect("valid regex"));

/// Current time as an ISO-8601 UTC timestamp with milliseconds.
pub fn datetime() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Turns an offer title or timestamp into a safe file name.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = RESERVED_FILENAME_CHARS.replace_all(name, FILENAME_REPLACEMENT);
    let trimmed = replaced.trim().trim_matches('.');
    if trimmed.is_empty() {
        return FILENAME_REPLACEMENT.to_string();
    }
    let mut end = trimmed.len().min(MAX_FILENAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
