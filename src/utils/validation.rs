//! Input normalization utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Runs of characters that are not safe in a URL path token
static NON_SLUG_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Runs of internal whitespace
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip surrounding whitespace from a hostgroup name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// True when the value is empty or whitespace only
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Render a title as a URL-safe token: lowercase, non-alphanumeric runs become `-`
pub fn parameterize(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Collapse internal whitespace runs to single spaces (used for search terms)
pub fn squish(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").to_string()
}
