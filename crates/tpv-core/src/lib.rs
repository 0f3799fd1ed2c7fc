//! # TPV Core Library
//!
//! Encrypted persistent store for a bar/restaurant point-of-sale till:
//! products, customers, waiters, receipts, configuration, an append-only
//! audit trail and rotating backups, all kept in one SQLite database that
//! only ever touches the disk as ciphertext.
//!
//! ## Security Model
//!
//! - The store file and every backup are ChaCha20-Poly1305 ciphertext
//! - Plaintext exists only in a private working copy for the length of one
//!   session, and is deleted on every exit path
//! - A wrong key or a modified file is detected, never silently misread
//! - Secrets and store contents are kept out of logs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Store (host-facing handle)       │
//! ├─────────────────────────────────────────┤
//! │   repo (entities, audit)  │   legacy    │
//! ├─────────────────────────────────────────┤
//! │   storage (session, schema, backup)     │
//! ├─────────────────────────────────────────┤
//! │        crypto (key, cipher)             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tpv_core::{Family, Money, NewProduct, Store, StoreConfig, StoreKey};
//!
//! # fn main() -> tpv_core::Result<()> {
//! let store = Store::open(&StoreConfig::in_dir("data"), StoreKey::from_env()?)?;
//! store.with_session(|s| {
//!     s.products()
//!         .save(&NewProduct::new("Coffee", Money::from_cents(120), Family::Drink), "ana")
//! })?;
//! store.create_backup()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod legacy;
pub mod logging;
pub mod repo;
pub mod storage;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use crypto::StoreKey;
pub use error::{Error, Result};
pub use repo::{
    AuditEntry, AuditFilter, Customer, NewCustomer, NewProduct, NewReceiptLine, NewWaiter,
    Printers, Product, ProductFilter, Receipt, ReceiptFilter, ReceiptLine, StoreStats, Waiter,
};
pub use storage::{BackupManager, Session, SessionManager};
pub use store::Store;
pub use types::{AuditAction, Family, Money, ReceiptStatus, RecordState, TaxRate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
