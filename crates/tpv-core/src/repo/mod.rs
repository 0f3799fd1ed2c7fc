//! Entity repositories.
//!
//! Repositories are query and mutation logic over a connection borrowed from
//! an open [`Session`](crate::storage::Session). They never open sessions
//! themselves, so several repository calls made in one session body commit
//! or roll back together.

mod audit;
mod config;
mod customer;
mod product;
mod receipt;
mod stats;
mod waiter;

pub use audit::{AuditEntry, AuditFilter, AuditLog};
pub use config::{
    Configuration, ConfigurationEntry, Printers, PASSWORD_HASH_KEY, PRINTERS_KEY, TAX_RATE_KEY,
};
pub use customer::{Customer, Customers, NewCustomer};
pub use product::{NewProduct, PriceHistoryEntry, Product, ProductFilter, Products};
pub use receipt::{NewReceiptLine, Receipt, ReceiptFilter, ReceiptLine, Receipts};
pub use stats::{StatusTotals, StoreStats};
pub use waiter::{NewWaiter, Waiter, Waiters};

use crate::error::{Error, Result};
use crate::types::decode_time;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Maximum length of product and waiter names.
pub const MAX_SHORT_NAME: usize = 50;

/// Maximum length of customer names.
pub const MAX_LONG_NAME: usize = 100;

/// Trim a name and check it is non-empty and not too long.
pub(crate) fn clean_name(kind: &str, name: &str, max: usize) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(format!("{} name cannot be empty", kind)));
    }
    if name.chars().count() > max {
        return Err(Error::Validation(format!(
            "{} name longer than {} characters",
            kind, max
        )));
    }
    Ok(name.to_string())
}

/// Trim an optional field, treating blank as absent.
pub(crate) fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn clean_actor(actor: &str) -> Result<&str> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(Error::Validation("actor cannot be empty".into()));
    }
    Ok(actor)
}

/// Read a stored timestamp column.
pub(crate) fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    decode_time(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::storage::schema;
    use rusqlite::Connection;

    /// An in-memory connection with the full schema.
    pub fn connection() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "foreign_keys", "ON").expect("pragma");
        schema::initialize(&conn).expect("schema");
        conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("product", "  Coffee ", 50).expect("name"), "Coffee");
        assert!(matches!(clean_name("product", "   ", 50), Err(Error::Validation(_))));
        assert!(clean_name("product", &"x".repeat(51), 50).is_err());
        assert!(clean_name("product", &"ñ".repeat(50), 50).is_ok());
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some(" 600 ")), Some("600".to_string()));
        assert_eq!(clean_optional(Some("  ")), None);
        assert_eq!(clean_optional(None), None);
    }
}
