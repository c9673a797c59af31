//! Scrubs the delegated secret value out of `exec`/`fetch` output before it
//! reaches the terminal, using the same streaming redactor the core's
//! delegated operations are built beside.

use vaultkeeper_redact::redact_all;

pub fn scrub(secret: &str, text: &str) -> String {
    let out = redact_all(secret.as_bytes(), b"[REDACTED]", text.as_bytes());
    String::from_utf8_lossy(&out).to_string()
}
