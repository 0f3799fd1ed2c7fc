//! Logging helpers that keep secrets and plaintext out of log output.
//!
//! Store contents are sensitive (sales, customer contacts, password hash),
//! so the core only ever logs sizes, paths and identifiers.

use std::fmt;

/// Displays as `[REDACTED]` whatever it wraps.
pub struct Redacted<T>(pub T);

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Displays a buffer as its length only, e.g. `[4096 bytes]`.
pub struct RedactedBytes<'a>(pub &'a [u8]);

impl fmt::Display for RedactedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl fmt::Debug for RedactedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Key fragments that mark a configuration entry as sensitive.
const SENSITIVE_PATTERNS: &[&str] = &["password", "secret", "key", "token", "hash", "credential"];

/// True when a configuration key or variable name looks like it holds a secret.
pub fn appears_sensitive(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|fragment| name.contains(fragment))
}

/// Render a configuration value for logging, hiding it when its key looks sensitive.
pub fn sanitize_for_log(key: &str, value: &str) -> String {
    if appears_sensitive(key) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_key_material() {
        let key = Redacted([0x42u8; 32]);
        assert_eq!(key.to_string(), "[REDACTED]");
        assert_eq!(format!("{:?}", key), "[REDACTED]");
    }

    #[test]
    fn test_redacted_bytes() {
        let page = vec![0u8; 4096];
        assert_eq!(RedactedBytes(&page).to_string(), "[4096 bytes]");
        assert_eq!(format!("{:?}", RedactedBytes(b"")), "[0 bytes]");
    }

    #[test]
    fn test_appears_sensitive() {
        assert!(appears_sensitive("password_hash"));
        assert!(appears_sensitive("TPV_SECRET"));
        assert!(!appears_sensitive("tax_rate"));
        assert!(!appears_sensitive("printers"));
    }

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("tax_rate", "2100"), "2100");
        assert_eq!(sanitize_for_log("password_hash", "abcd"), "[REDACTED]");
    }
}
