//! Encrypted persistent storage.
//!
//! The store is a single SQLite database that only ever exists on disk as
//! ciphertext. Every access is one [`SessionManager::with_session`] cycle:
//! decrypt to a private working copy, run one transaction, reseal, and
//! atomically swap the ciphertext into place.
//!
//! ## Rules
//!
//! - The working copy never outlives the session, on any exit path
//! - A failed session leaves the store file byte-for-byte unchanged
//! - Sessions are serialized in-process
//! - No WAL: the journal stays inside the working copy's lifetime

mod backup;
pub mod schema;
mod session;

pub use backup::{BackupManager, DEFAULT_RETENTION};
pub use schema::SchemaStatus;
pub use session::{Session, SessionManager, SEALING_SUFFIX, WORKING_SUFFIX};

/// Default store file name.
pub const DEFAULT_STORE_NAME: &str = "tpv.db";

/// Default backup directory name, relative to the data directory.
pub const DEFAULT_BACKUP_DIR: &str = "backup";
