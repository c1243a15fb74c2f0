//! Live-session URL discovery and cleanup.
//!
//! The agent's real-time browser view is announced either through a
//! dedicated `live_url` event or only inside log text. Log lines are
//! colourised, so matches are cleaned before being shown.

use once_cell::sync::Lazy;
use regex::Regex;

static LIVE_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https://live\.browser-use\.com[^\s\x1b]+").expect("live url pattern is valid")
});

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi pattern is valid"));

/// Remove ANSI escape sequences (colours, cursor movement) from `text`.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Strip escape sequences and surrounding whitespace from a URL.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_live_url(raw: &str) -> Option<String> {
    let cleaned = strip_ansi(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Find the first live-session URL embedded in a log message.
pub fn extract_live_url(message: &str) -> Option<String> {
    LIVE_URL_PATTERN
        .find(message)
        .and_then(|m| sanitize_live_url(m.as_str()))
}
