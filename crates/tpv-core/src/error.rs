//! Error types for the TPV store.
//!
//! Read failures (wrong key, corrupted or tampered file) are kept apart from
//! validation failures (bad receipt totals, bad input): the former mean the
//! environment is broken and retrying will not help, the latter are caller
//! problems that can be fixed and retried.

use thiserror::Error;

/// Core error type for store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No application secret was supplied.
    #[error("no encryption secret configured")]
    NoSecret,

    /// The store file could not be opened with the configured key.
    /// Either the key is wrong or the file is corrupted.
    #[error("store unreadable: wrong key or corrupted file")]
    StoreUnreadable,

    /// Authentication check failed inside the cipher.
    /// Details are intentionally omitted.
    #[error("authentication failed: tampered data or wrong key")]
    TamperOrWrongKey,

    /// A receipt failed its totals check. Nothing was persisted.
    #[error("inconsistent receipt totals: {0}")]
    InconsistentTotals(String),

    /// Input rejected before touching the store.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Receipt status change not allowed from the current status.
    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    /// Schema could not be created or migrated.
    #[error("schema initialization failed: {0}")]
    SchemaInit(String),

    /// Working copy, atomic rename or backup copy failed.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// Relational engine error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Snapshot or configuration value could not be encoded/decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias using the store's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the store cannot be read with the configured key.
    ///
    /// Callers treat both variants the same way: surface to the operator,
    /// never auto-retry.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Error::StoreUnreadable | Error::TamperOrWrongKey)
    }

    /// True when the caller may fix its input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InconsistentTotals(_)
                | Error::Validation(_)
                | Error::InvalidTransition(_)
                | Error::NotFound(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Filesystem(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_classification() {
        assert!(Error::StoreUnreadable.is_unreadable());
        assert!(Error::TamperOrWrongKey.is_unreadable());
        assert!(!Error::InconsistentTotals("x".into()).is_unreadable());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::InconsistentTotals("x".into()).is_recoverable());
        assert!(Error::Validation("x".into()).is_recoverable());
        assert!(!Error::StoreUnreadable.is_recoverable());
        assert!(!Error::SchemaInit("x".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_maps_to_filesystem() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(io), Error::Filesystem(_)));
    }
}
