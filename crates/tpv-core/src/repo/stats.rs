//! Aggregate figures over the store contents.

use crate::error::Result;
use crate::types::{Money, ReceiptStatus};
use rusqlite::Connection;
use serde::Serialize;

/// Receipt count and value for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    /// Status.
    pub status: ReceiptStatus,
    /// Number of receipts.
    pub count: u64,
    /// Sum of their totals.
    pub total: Money,
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Active products.
    pub products: u64,
    /// Active customers.
    pub customers: u64,
    /// Active waiters.
    pub waiters: u64,
    /// Receipts per status, every status listed.
    pub receipts: Vec<StatusTotals>,
    /// Audit entries.
    pub audit_entries: u64,
    /// Size of the encrypted store file, when known.
    pub store_bytes: Option<u64>,
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

impl StoreStats {
    /// Gather statistics from an open connection.
    pub fn collect(conn: &Connection) -> Result<Self> {
        let mut receipts = Vec::new();
        let mut stmt = conn.prepare_cached(
            "SELECT COUNT(*), COALESCE(SUM(total), 0) FROM receipts WHERE status = ?",
        )?;
        for status in [
            ReceiptStatus::Pending,
            ReceiptStatus::PaidCash,
            ReceiptStatus::PaidCard,
        ] {
            let (n, total): (i64, Money) =
                stmt.query_row([status], |row| Ok((row.get(0)?, row.get(1)?)))?;
            receipts.push(StatusTotals {
                status,
                count: n.max(0) as u64,
                total,
            });
        }

        Ok(Self {
            products: count(conn, "SELECT COUNT(*) FROM products WHERE active = 1")?,
            customers: count(conn, "SELECT COUNT(*) FROM customers WHERE active = 1")?,
            waiters: count(conn, "SELECT COUNT(*) FROM waiters WHERE active = 1")?,
            receipts,
            audit_entries: count(conn, "SELECT COUNT(*) FROM audit_log")?,
            store_bytes: None,
        })
    }

    /// Receipts across all statuses.
    pub fn receipt_count(&self) -> u64 {
        self.receipts.iter().map(|r| r.count).sum()
    }

    /// Value of paid receipts, `None` on overflow.
    pub fn paid_total(&self) -> Option<Money> {
        self.receipts
            .iter()
            .filter(|r| r.status.is_paid())
            .try_fold(Money::ZERO, |acc, r| acc.checked_add(r.total))
    }
}
