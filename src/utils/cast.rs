//! Boolean coercion of parameter values
//!
//! Accepted literals, case-insensitive and ignoring surrounding whitespace:
//!
//! | result  | literals                                  |
//! |---------|-------------------------------------------|
//! | `true`  | `true` `t` `yes` `y` `on` `1`             |
//! | `false` | `false` `f` `no` `n` `off` `0` and empty  |
//!
//! Anything else is neither true nor false.

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "1"];
const FALSY: &[&str] = &["false", "f", "no", "n", "off", "0", ""];

/// Coerce a string to a boolean, `None` when it is not a recognised literal
pub fn to_bool(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&normalized.as_str()) {
        Some(true)
    } else if FALSY.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}
