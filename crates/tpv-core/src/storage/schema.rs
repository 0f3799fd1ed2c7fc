//! Database schema definitions.
//!
//! The schema is created in one pass the first time a session runs against
//! an empty store. Later versions may only add columns or indexes; each one
//! is a numbered migration tracked in `PRAGMA user_version`.

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Table whose presence marks an initialized store.
pub const MARKER_TABLE: &str = "products";

/// SQL to create the database schema.
pub const CREATE_SCHEMA: &str = r#"
-- Product catalogue. Rows are never deleted, only deactivated.
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0),
    family TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    modified_by TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_products_active_name ON products(name) WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
CREATE INDEX IF NOT EXISTS idx_products_family ON products(family);

-- Price changes, written before the product row is updated
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id),
    old_price INTEGER NOT NULL,
    new_price INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    actor TEXT
);

CREATE INDEX IF NOT EXISTS idx_price_history_product ON price_history(product_id);

-- Customers (pending tickets are opened in their name)
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    notes TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_active_name ON customers(name) WHERE active = 1;

-- Waiters
CREATE TABLE IF NOT EXISTS waiters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_waiters_active_name ON waiters(name) WHERE active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS idx_waiters_code ON waiters(code) WHERE code IS NOT NULL AND active = 1;

-- Receipts (tickets), all years in one table
CREATE TABLE IF NOT EXISTS receipts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    customer_name TEXT,
    waiter_name TEXT NOT NULL,
    status TEXT NOT NULL,
    subtotal INTEGER NOT NULL,
    tax_rate_snapshot INTEGER NOT NULL,
    total INTEGER NOT NULL,
    printed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_receipts_timestamp ON receipts(timestamp);
CREATE INDEX IF NOT EXISTS idx_receipts_status ON receipts(status);
CREATE INDEX IF NOT EXISTS idx_receipts_customer ON receipts(customer_name);
CREATE INDEX IF NOT EXISTS idx_receipts_waiter ON receipts(waiter_name);

-- Receipt lines, ordered by position within their receipt
CREATE TABLE IF NOT EXISTS receipt_lines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    receipt_id INTEGER NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    product_name TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price INTEGER NOT NULL CHECK (unit_price >= 0),
    family TEXT NOT NULL,
    line_subtotal INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_receipt_lines_receipt ON receipt_lines(receipt_id);

-- Settings: one row per logical setting, JSON-encoded value
CREATE TABLE IF NOT EXISTS configuration (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

-- Audit trail
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    action TEXT NOT NULL,
    record_id INTEGER NOT NULL,
    before_snapshot TEXT,
    after_snapshot TEXT,
    actor TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_record ON audit_log(table_name, record_id);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;
"#;

/// A numbered, additive schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version reached after applying this migration.
    pub version: u32,
    /// DDL to run.
    pub sql: &'static str,
}

/// All migrations, in order. Version 1 is the base schema.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: CREATE_SCHEMA,
}];

/// Outcome of schema initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Empty store; full schema created.
    Created {
        /// Version written.
        version: u32,
    },
    /// Older store; pending migrations applied.
    Migrated {
        /// Version found.
        from: u32,
        /// Version written.
        to: u32,
    },
    /// Nothing to do.
    Current,
}

/// Create or migrate the schema. Idempotent.
pub fn initialize(conn: &Connection) -> Result<SchemaStatus> {
    initialize_with(conn, MIGRATIONS)
}

pub(crate) fn initialize_with(conn: &Connection, migrations: &[Migration]) -> Result<SchemaStatus> {
    let latest = migrations.last().map(|m| m.version).unwrap_or(0);

    if !has_marker_table(conn)? {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::SchemaInit(e.to_string()))?;
        for migration in migrations {
            apply(&tx, migration)?;
        }
        set_version(&tx, latest)?;
        tx.commit().map_err(|e| Error::SchemaInit(e.to_string()))?;
        tracing::info!(version = latest, "created store schema");
        return Ok(SchemaStatus::Created { version: latest });
    }

    let current = version(conn)?;
    if current >= latest {
        return Ok(SchemaStatus::Current);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::SchemaInit(e.to_string()))?;
    for migration in migrations.iter().filter(|m| m.version > current) {
        apply(&tx, migration)?;
    }
    set_version(&tx, latest)?;
    tx.commit().map_err(|e| Error::SchemaInit(e.to_string()))?;
    tracing::info!(from = current, to = latest, "migrated store schema");
    Ok(SchemaStatus::Migrated {
        from: current,
        to: latest,
    })
}

fn has_marker_table(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [MARKER_TABLE],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| Error::SchemaInit(e.to_string()))
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute_batch(migration.sql).map_err(|e| {
        Error::SchemaInit(format!("migration {} failed: {}", migration.version, e))
    })
}

/// Schema version recorded in the store.
pub fn version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, u32>(0))
        .map_err(|e| Error::SchemaInit(e.to_string()))
}

fn set_version(conn: &Connection, version: u32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)
        .map_err(|e| Error::SchemaInit(e.to_string()))
}
