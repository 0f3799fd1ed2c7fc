//! Receipts (tickets) and their lines.
//!
//! Totals are supplied by the caller and checked before anything is
//! written. [`Receipt::new`] computes them correctly for callers that do not
//! carry their own arithmetic.

use super::{clean_actor, clean_name, time_column, AuditLog, MAX_LONG_NAME, MAX_SHORT_NAME};
use crate::error::{Error, Result};
use crate::types::{encode_time, now, AuditAction, Family, Money, ReceiptStatus, TaxRate};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const TABLE: &str = "receipts";

const COLUMNS: &str = "id, timestamp, customer_name, waiter_name, status, subtotal, \
                       tax_rate_snapshot, total, printed, created_at, modified_at";

/// A line as entered at the till.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceiptLine {
    /// Product name at the time of sale.
    pub product_name: String,
    /// Units sold.
    pub quantity: u32,
    /// Price per unit at the time of sale.
    pub unit_price: Money,
    /// Family at the time of sale.
    pub family: Family,
}

impl NewReceiptLine {
    /// Convenience constructor.
    pub fn new(product_name: impl Into<String>, quantity: u32, unit_price: Money, family: Family) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            unit_price,
            family,
        }
    }
}

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Product name at the time of sale.
    pub product_name: String,
    /// Units sold.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
    /// Family at the time of sale.
    pub family: Family,
    /// `quantity * unit_price`.
    pub line_subtotal: Money,
}

/// A receipt with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Row id, `None` until saved.
    pub id: Option<i64>,
    /// Time of sale.
    pub timestamp: DateTime<Utc>,
    /// `None` for an anonymous sale.
    pub customer_name: Option<String>,
    /// Waiter who served.
    pub waiter_name: String,
    /// Payment status.
    pub status: ReceiptStatus,
    /// Sum of line subtotals.
    pub subtotal: Money,
    /// Tax rate in force when the receipt was made.
    pub tax_rate: TaxRate,
    /// Subtotal plus tax.
    pub total: Money,
    /// Whether the receipt has been printed.
    pub printed: bool,
    /// Lines in entry order.
    pub lines: Vec<ReceiptLine>,
    /// Set by the store on first save.
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the store on every save.
    pub modified_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Build a pending receipt stamped now, with totals computed from the lines.
    pub fn new(
        waiter_name: impl Into<String>,
        customer_name: Option<String>,
        tax_rate: TaxRate,
        lines: Vec<NewReceiptLine>,
    ) -> Result<Self> {
        let lines = lines
            .into_iter()
            .map(|line| {
                let line_subtotal = line.unit_price.checked_mul(line.quantity).ok_or_else(|| {
                    Error::Validation(format!("line total overflows for {}", line.product_name))
                })?;
                Ok(ReceiptLine {
                    product_name: line.product_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    family: line.family,
                    line_subtotal,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let subtotal = checked_sum(lines.iter().map(|l| l.line_subtotal))
            .ok_or_else(|| Error::Validation("receipt subtotal overflows".into()))?;
        let total = tax_rate
            .checked_tax_on(subtotal)
            .and_then(|tax| subtotal.checked_add(tax))
            .ok_or_else(|| Error::Validation("receipt total overflows".into()))?;

        Ok(Self {
            id: None,
            timestamp: now(),
            customer_name,
            waiter_name: waiter_name.into(),
            status: ReceiptStatus::Pending,
            subtotal,
            tax_rate,
            total,
            printed: false,
            lines,
            created_at: None,
            modified_at: None,
        })
    }

    /// Check `line_subtotal`, `subtotal` and `total` against the lines.
    pub fn check_totals(&self) -> Result<()> {
        for (i, line) in self.lines.iter().enumerate() {
            if line.unit_price.checked_mul(line.quantity) != Some(line.line_subtotal) {
                return Err(Error::InconsistentTotals(format!(
                    "line {} ({}): {} x {} != {}",
                    i + 1,
                    line.product_name,
                    line.quantity,
                    line.unit_price,
                    line.line_subtotal
                )));
            }
        }

        let expected = checked_sum(self.lines.iter().map(|l| l.line_subtotal));
        if expected != Some(self.subtotal) {
            return Err(Error::InconsistentTotals(format!(
                "subtotal {} does not match the sum of its lines",
                self.subtotal
            )));
        }

        let expected = self
            .tax_rate
            .checked_tax_on(self.subtotal)
            .and_then(|tax| self.subtotal.checked_add(tax));
        if expected != Some(self.total) {
            return Err(Error::InconsistentTotals(format!(
                "total {} is not subtotal {} plus {} tax",
                self.total, self.subtotal, self.tax_rate
            )));
        }
        Ok(())
    }

    fn check_lines(&self) -> Result<()> {
        for line in &self.lines {
            clean_name("product", &line.product_name, MAX_SHORT_NAME)?;
            if line.quantity == 0 {
                return Err(Error::Validation(format!(
                    "quantity of {} must be positive",
                    line.product_name
                )));
            }
            if line.unit_price.is_negative() {
                return Err(Error::Validation(format!(
                    "price of {} cannot be negative",
                    line.product_name
                )));
            }
        }
        Ok(())
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Money>) -> Option<Money> {
    amounts.try_fold(Money::ZERO, Money::checked_add)
}

/// Selection for [`Receipts::get_all`]. All conditions are combined.
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    /// Only this status.
    pub status: Option<ReceiptStatus>,
    /// Only this customer.
    pub customer_name: Option<String>,
    /// Only this waiter.
    pub waiter_name: Option<String>,
    /// Sold at or after.
    pub from: Option<DateTime<Utc>>,
    /// Sold before.
    pub until: Option<DateTime<Utc>>,
    /// At most this many receipts.
    pub limit: Option<u32>,
    /// Skip this many (newest first).
    pub offset: Option<u32>,
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: Some(row.get(0)?),
        timestamp: time_column(row, 1)?,
        customer_name: row.get(2)?,
        waiter_name: row.get(3)?,
        status: row.get(4)?,
        subtotal: row.get(5)?,
        tax_rate: row.get(6)?,
        total: row.get(7)?,
        printed: row.get(8)?,
        lines: Vec::new(),
        created_at: Some(time_column(row, 9)?),
        modified_at: Some(time_column(row, 10)?),
    })
}

/// Receipt repository.
pub struct Receipts<'a> {
    conn: &'a Connection,
}

impl<'a> Receipts<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a receipt, or replace a pending one (lines included).
    ///
    /// Totals are checked first; on [`Error::InconsistentTotals`] nothing is
    /// written. A paid receipt cannot be saved again. Returns the id.
    pub fn save(&self, receipt: &Receipt, actor: &str) -> Result<i64> {
        let actor = clean_actor(actor)?;
        let waiter = clean_name("waiter", &receipt.waiter_name, MAX_SHORT_NAME)?;
        let customer = receipt
            .customer_name
            .as_deref()
            .map(|c| clean_name("customer", c, MAX_LONG_NAME))
            .transpose()?;
        receipt.check_lines()?;
        receipt.check_totals()?;

        let audit = AuditLog::new(self.conn);
        let stamp = encode_time(&now());

        let Some(id) = receipt.id else {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (timestamp, customer_name, waiter_name, status, subtotal, \
                     tax_rate_snapshot, total, printed, created_at, modified_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    TABLE
                ),
                params![
                    encode_time(&receipt.timestamp),
                    customer,
                    waiter,
                    receipt.status,
                    receipt.subtotal,
                    receipt.tax_rate,
                    receipt.total,
                    receipt.printed,
                    stamp,
                    stamp,
                ],
            )?;
            let id = self.conn.last_insert_rowid();
            self.insert_lines(id, &receipt.lines)?;

            let after = self.snapshot(id)?;
            audit.record(TABLE, AuditAction::Insert, id, None, Some(&after), actor)?;
            tracing::info!(id, status = %receipt.status, total = %receipt.total, "receipt created");
            return Ok(id);
        };

        let existing = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))?;
        if existing.status.is_paid() {
            return Err(Error::InvalidTransition(format!(
                "receipt {} is {} and cannot be modified",
                id, existing.status
            )));
        }
        if receipt.status != existing.status && !existing.status.can_transition_to(receipt.status) {
            return Err(Error::InvalidTransition(format!(
                "receipt {}: {} -> {}",
                id, existing.status, receipt.status
            )));
        }

        self.conn.execute(
            &format!(
                "UPDATE {} SET timestamp = ?, customer_name = ?, waiter_name = ?, status = ?, \
                 subtotal = ?, tax_rate_snapshot = ?, total = ?, printed = ?, modified_at = ? \
                 WHERE id = ?",
                TABLE
            ),
            params![
                encode_time(&receipt.timestamp),
                customer,
                waiter,
                receipt.status,
                receipt.subtotal,
                receipt.tax_rate,
                receipt.total,
                receipt.printed,
                stamp,
                id,
            ],
        )?;
        self.conn
            .execute("DELETE FROM receipt_lines WHERE receipt_id = ?", [id])?;
        self.insert_lines(id, &receipt.lines)?;

        let before = serde_json::to_value(&existing)?;
        let after = self.snapshot(id)?;
        audit.record(TABLE, AuditAction::Update, id, Some(&before), Some(&after), actor)?;
        tracing::debug!(id, lines = receipt.lines.len(), "pending receipt replaced");
        Ok(id)
    }

    /// A receipt with its lines.
    pub fn get(&self, id: i64) -> Result<Option<Receipt>> {
        let receipt = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, TABLE),
                [id],
                receipt_from_row,
            )
            .optional()?;

        match receipt {
            Some(mut receipt) => {
                receipt.lines = self.lines(id)?;
                Ok(Some(receipt))
            }
            None => Ok(None),
        }
    }

    /// Receipts matching `filter`, newest first, with lines attached.
    pub fn get_all(&self, filter: &ReceiptFilter) -> Result<Vec<Receipt>> {
        let mut sql = format!("SELECT {} FROM {} WHERE 1 = 1", COLUMNS, TABLE);
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(customer) = &filter.customer_name {
            sql.push_str(" AND customer_name = ?");
            args.push(SqlValue::Text(customer.trim().to_string()));
        }
        if let Some(waiter) = &filter.waiter_name {
            sql.push_str(" AND waiter_name = ?");
            args.push(SqlValue::Text(waiter.trim().to_string()));
        }
        if let Some(from) = &filter.from {
            sql.push_str(" AND timestamp >= ?");
            args.push(SqlValue::Text(encode_time(from)));
        }
        if let Some(until) = &filter.until {
            sql.push_str(" AND timestamp < ?");
            args.push(SqlValue::Text(encode_time(until)));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");
        if filter.limit.is_some() || filter.offset.is_some() {
            // SQLite requires LIMIT before OFFSET; -1 means no limit.
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(SqlValue::Integer(filter.limit.map_or(-1, i64::from)));
            args.push(SqlValue::Integer(filter.offset.map_or(0, i64::from)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut receipts = stmt
            .query_map(params_from_iter(args), receipt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for receipt in &mut receipts {
            if let Some(id) = receipt.id {
                receipt.lines = self.lines(id)?;
            }
        }
        Ok(receipts)
    }

    /// Move a pending receipt to a paid status.
    pub fn update_status(&self, id: i64, status: ReceiptStatus, actor: &str) -> Result<()> {
        let actor = clean_actor(actor)?;
        let existing = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))?;
        if !existing.status.can_transition_to(status) {
            return Err(Error::InvalidTransition(format!(
                "receipt {}: {} -> {}",
                id, existing.status, status
            )));
        }

        self.conn.execute(
            "UPDATE receipts SET status = ?, modified_at = ? WHERE id = ?",
            params![status, encode_time(&now()), id],
        )?;
        self.audit_update(&existing, actor)?;
        tracing::info!(id, %status, "receipt paid");
        Ok(())
    }

    /// Flag a receipt as printed. Allowed in any status.
    pub fn mark_printed(&self, id: i64, actor: &str) -> Result<()> {
        let actor = clean_actor(actor)?;
        let existing = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))?;

        self.conn.execute(
            "UPDATE receipts SET printed = 1, modified_at = ? WHERE id = ?",
            params![encode_time(&now()), id],
        )?;
        self.audit_update(&existing, actor)
    }

    /// Remove a receipt and its lines. `false` if it does not exist.
    pub fn delete(&self, id: i64, actor: &str) -> Result<bool> {
        let actor = clean_actor(actor)?;
        let Some(existing) = self.get(id)? else {
            return Ok(false);
        };

        self.conn.execute("DELETE FROM receipts WHERE id = ?", [id])?;
        let before = serde_json::to_value(&existing)?;
        AuditLog::new(self.conn).record(TABLE, AuditAction::Delete, id, Some(&before), None, actor)?;
        tracing::info!(id, "receipt deleted");
        Ok(true)
    }

    fn insert_lines(&self, receipt_id: i64, lines: &[ReceiptLine]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO receipt_lines \
             (receipt_id, position, product_name, quantity, unit_price, family, line_subtotal) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (position, line) in lines.iter().enumerate() {
            stmt.execute(params![
                receipt_id,
                position as i64,
                line.product_name.trim(),
                line.quantity,
                line.unit_price,
                line.family,
                line.line_subtotal,
            ])?;
        }
        Ok(())
    }

    fn lines(&self, receipt_id: i64) -> Result<Vec<ReceiptLine>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT product_name, quantity, unit_price, family, line_subtotal \
             FROM receipt_lines WHERE receipt_id = ? ORDER BY position",
        )?;
        let lines = stmt
            .query_map([receipt_id], |row| {
                Ok(ReceiptLine {
                    product_name: row.get(0)?,
                    quantity: row.get(1)?,
                    unit_price: row.get(2)?,
                    family: row.get(3)?,
                    line_subtotal: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    fn audit_update(&self, before: &Receipt, actor: &str) -> Result<()> {
        let id = before
            .id
            .ok_or_else(|| Error::NotFound("receipt without id".into()))?;
        let after = self.snapshot(id)?;
        let before = serde_json::to_value(before)?;
        AuditLog::new(self.conn).record(TABLE, AuditAction::Update, id, Some(&before), Some(&after), actor)?;
        Ok(())
    }

    fn snapshot(&self, id: i64) -> Result<serde_json::Value> {
        let receipt = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("receipt {}", id)))?;
        Ok(serde_json::to_value(receipt)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{testing, AuditFilter};

    fn sample() -> Receipt {
        Receipt::new(
            "Pepe",
            Some("Mesa 4".into()),
            TaxRate::DEFAULT,
            vec![
                NewReceiptLine::new("Coffee", 2, Money::from_cents(120), Family::Drink),
                NewReceiptLine::new("Toast", 1, Money::from_cents(250), Family::Food),
            ],
        )
        .expect("receipt")
    }

    #[test]
    fn test_new_computes_totals() {
        let r = sample();
        assert_eq!(r.lines[0].line_subtotal, Money::from_cents(240));
        assert_eq!(r.subtotal, Money::from_cents(490));
        // 4.90 * 21% = 1.029 -> 1.03
        assert_eq!(r.total, Money::from_cents(593));
        r.check_totals().expect("consistent");
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let receipt = sample();

        let id = receipts.save(&receipt, "pepe").expect("save");
        let stored = receipts.get(id).expect("get").expect("present");

        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.timestamp, receipt.timestamp);
        assert_eq!(stored.customer_name, receipt.customer_name);
        assert_eq!(stored.lines, receipt.lines);
        assert_eq!(stored.total, receipt.total);
        assert!(stored.created_at.is_some());
    }

    #[test]
    fn test_inconsistent_totals_write_nothing() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);

        let mut bad_line = sample();
        bad_line.lines[0].line_subtotal = Money::from_cents(100);
        let mut bad_subtotal = sample();
        bad_subtotal.subtotal = Money::from_cents(1);
        let mut bad_total = sample();
        bad_total.total = bad_total.subtotal;

        for bad in [bad_line, bad_subtotal, bad_total] {
            assert!(matches!(
                receipts.save(&bad, "pepe"),
                Err(Error::InconsistentTotals(_))
            ));
        }
        assert!(receipts.get_all(&ReceiptFilter::default()).expect("list").is_empty());
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 0);
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let huge = Receipt::new(
            "Pepe",
            None,
            TaxRate::from_basis_points(100_000),
            vec![NewReceiptLine::new("Caviar", 1, Money::from_cents(i64::MAX / 2), Family::Food)],
        );
        assert!(matches!(huge, Err(Error::Validation(_))));
    }

    #[test]
    fn test_line_validation() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let mut zero = sample();
        zero.lines[1].quantity = 0;
        zero.lines[1].line_subtotal = Money::ZERO;
        zero.subtotal = Money::from_cents(240);
        zero.total = Money::from_cents(290);
        assert!(matches!(receipts.save(&zero, "pepe"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_resave_pending_replaces_lines() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let id = receipts.save(&sample(), "pepe").expect("save");

        let mut updated = Receipt::new(
            "Pepe",
            Some("Mesa 4".into()),
            TaxRate::DEFAULT,
            vec![NewReceiptLine::new("Beer", 3, Money::from_cents(200), Family::Drink)],
        )
        .expect("receipt");
        updated.id = Some(id);
        receipts.save(&updated, "pepe").expect("resave");

        let stored = receipts.get(id).expect("get").expect("present");
        assert_eq!(stored.lines.len(), 1);
        assert_eq!(stored.lines[0].product_name, "Beer");
        assert_eq!(stored.subtotal, Money::from_cents(600));

        let line_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM receipt_lines", [], |r| r.get(0))
            .expect("count");
        assert_eq!(line_rows, 1);
    }

    #[test]
    fn test_status_transitions() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let id = receipts.save(&sample(), "pepe").expect("save");

        receipts
            .update_status(id, ReceiptStatus::PaidCard, "pepe")
            .expect("pay");
        assert!(matches!(
            receipts.update_status(id, ReceiptStatus::PaidCash, "pepe"),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            receipts.update_status(id, ReceiptStatus::Pending, "pepe"),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            receipts.update_status(999, ReceiptStatus::PaidCash, "pepe"),
            Err(Error::NotFound(_))
        ));

        let mut paid = receipts.get(id).expect("get").expect("present");
        assert_eq!(paid.status, ReceiptStatus::PaidCard);
        paid.waiter_name = "Juan".into();
        assert!(matches!(receipts.save(&paid, "pepe"), Err(Error::InvalidTransition(_))));

        receipts.mark_printed(id, "pepe").expect("print");
        assert!(receipts.get(id).expect("get").expect("present").printed);
    }

    #[test]
    fn test_delete_is_hard_and_audited() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let id = receipts.save(&sample(), "pepe").expect("save");

        assert!(receipts.delete(id, "pepe").expect("delete"));
        assert!(!receipts.delete(id, "pepe").expect("again"));
        assert!(receipts.get(id).expect("get").is_none());

        let lines: i64 = conn
            .query_row("SELECT COUNT(*) FROM receipt_lines", [], |r| r.get(0))
            .expect("count");
        assert_eq!(lines, 0);

        let trail = AuditLog::new(&conn)
            .entries(&AuditFilter {
                table: Some("receipts".into()),
                record_id: Some(id),
                limit: None,
            })
            .expect("audit");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, AuditAction::Delete);
        assert!(trail[0].before.is_some());
        assert!(trail[0].after.is_none());
    }

    #[test]
    fn test_filters_and_paging() {
        let conn = testing::connection();
        let receipts = Receipts::new(&conn);
        let base = now();

        for i in 0..5 {
            let mut r = sample();
            r.timestamp = base + chrono::Duration::minutes(i);
            if i % 2 == 0 {
                r.waiter_name = "Juan".into();
                r.customer_name = None;
            }
            receipts.save(&r, "pepe").expect("save");
        }

        let all = receipts.get_all(&ReceiptFilter::default()).expect("all");
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert!(all.iter().all(|r| r.lines.len() == 2));

        let juan = receipts
            .get_all(&ReceiptFilter {
                waiter_name: Some("Juan".into()),
                ..Default::default()
            })
            .expect("juan");
        assert_eq!(juan.len(), 3);
        assert!(juan.iter().all(|r| r.customer_name.is_none()));

        let window = receipts
            .get_all(&ReceiptFilter {
                from: Some(base + chrono::Duration::minutes(1)),
                until: Some(base + chrono::Duration::minutes(3)),
                ..Default::default()
            })
            .expect("window");
        assert_eq!(window.len(), 2);

        let page = receipts
            .get_all(&ReceiptFilter {
                offset: Some(1),
                limit: Some(2),
                ..Default::default()
            })
            .expect("page");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);

        let skipped = receipts
            .get_all(&ReceiptFilter {
                offset: Some(4),
                ..Default::default()
            })
            .expect("offset only");
        assert_eq!(skipped.len(), 1);

        let pending = receipts
            .get_all(&ReceiptFilter {
                status: Some(ReceiptStatus::Pending),
                ..Default::default()
            })
            .expect("pending");
        assert_eq!(pending.len(), 5);
    }
}
