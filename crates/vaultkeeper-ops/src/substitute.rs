//! `{{secret}}` placeholder substitution.
//!
//! Byte-literal replacement — no URL-escaping, no shell-aware quoting.
//! This is intentional: callers are responsible for pre-encoding the
//! secret if it is going somewhere that requires escaping. Documenting it
//! loudly here rather than silently guessing a safer behavior.

const PLACEHOLDER: &str = "{{secret}}";

/// Replaces every literal occurrence of `{{secret}}` in `input` with
/// `value`, byte-for-byte.
pub fn substitute(input: &str, value: &str) -> String {
    input.replace(PLACEHOLDER, value)
}
