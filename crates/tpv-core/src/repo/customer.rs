//! Customers, under whose name pending tickets are kept open.

use super::{clean_actor, clean_name, clean_optional, time_column, AuditLog, MAX_LONG_NAME};
use crate::error::{Error, Result};
use crate::types::{encode_time, now, AuditAction, RecordState};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const TABLE: &str = "customers";

const COLUMNS: &str = "id, name, phone, email, notes, active, created_at, modified_at";

/// Customer data supplied by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    /// Name, unique among active customers.
    pub name: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Free text.
    pub notes: Option<String>,
}

impl NewCustomer {
    /// A customer with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A stored customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Row id.
    pub id: i64,
    /// Name.
    pub name: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Free text.
    pub notes: Option<String>,
    /// Soft-delete state.
    pub state: RecordState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub modified_at: DateTime<Utc>,
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        notes: row.get(4)?,
        state: row.get(5)?,
        created_at: time_column(row, 6)?,
        modified_at: time_column(row, 7)?,
    })
}

/// Customer repository.
pub struct Customers<'a> {
    conn: &'a Connection,
}

impl<'a> Customers<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a customer, or update (and reactivate) the one with this name.
    pub fn save(&self, customer: &NewCustomer, actor: &str) -> Result<i64> {
        let name = clean_name("customer", &customer.name, MAX_LONG_NAME)?;
        let actor = clean_actor(actor)?;
        let phone = clean_optional(customer.phone.as_deref());
        let email = clean_optional(customer.email.as_deref());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(Error::Validation(format!("invalid email: {:?}", email)));
            }
        }
        let notes = clean_optional(customer.notes.as_deref());

        let audit = AuditLog::new(self.conn);
        let stamp = encode_time(&now());

        match self.find_any(&name)? {
            None => {
                self.conn.execute(
                    "INSERT INTO customers (name, phone, email, notes, active, created_at, modified_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![name, phone, email, notes, RecordState::Active, stamp, stamp],
                )?;
                let id = self.conn.last_insert_rowid();
                let after = self.snapshot(id)?;
                audit.record(TABLE, AuditAction::Insert, id, None, Some(&after), actor)?;
                tracing::info!(id, "customer created");
                Ok(id)
            }
            Some(existing) => {
                self.conn.execute(
                    "UPDATE customers SET phone = ?, email = ?, notes = ?, active = ?, modified_at = ? \
                     WHERE id = ?",
                    params![phone, email, notes, RecordState::Active, stamp, existing.id],
                )?;
                let before = serde_json::to_value(&existing)?;
                let after = self.snapshot(existing.id)?;
                audit.record(TABLE, AuditAction::Update, existing.id, Some(&before), Some(&after), actor)?;
                Ok(existing.id)
            }
        }
    }

    /// List customers ordered by name.
    pub fn get_all(&self, include_inactive: bool) -> Result<Vec<Customer>> {
        let sql = if include_inactive {
            format!("SELECT {} FROM {} ORDER BY name, id", COLUMNS, TABLE)
        } else {
            format!("SELECT {} FROM {} WHERE active = 1 ORDER BY name, id", COLUMNS, TABLE)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let customers = stmt
            .query_map([], customer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(customers)
    }

    /// The active customer with this name.
    pub fn find(&self, name: &str) -> Result<Option<Customer>> {
        let customer = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE name = ? AND active = 1", COLUMNS, TABLE),
                [name.trim()],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    /// Deactivate the customer with this name. `false` if none is active.
    pub fn delete(&self, name: &str, actor: &str) -> Result<bool> {
        let actor = clean_actor(actor)?;
        let Some(existing) = self.find(name)? else {
            return Ok(false);
        };

        self.conn.execute(
            "UPDATE customers SET active = ?, modified_at = ? WHERE id = ?",
            params![RecordState::Inactive, encode_time(&now()), existing.id],
        )?;
        let before = serde_json::to_value(&existing)?;
        let after = self.snapshot(existing.id)?;
        AuditLog::new(self.conn).record(
            TABLE,
            AuditAction::Delete,
            existing.id,
            Some(&before),
            Some(&after),
            actor,
        )?;
        tracing::info!(id = existing.id, "customer deactivated");
        Ok(true)
    }

    fn find_any(&self, name: &str) -> Result<Option<Customer>> {
        let customer = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE name = ? ORDER BY active DESC, id DESC LIMIT 1",
                    COLUMNS, TABLE
                ),
                [name],
                customer_from_row,
            )
            .optional()?;
        Ok(customer)
    }

    fn snapshot(&self, id: i64) -> Result<serde_json::Value> {
        let customer = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, TABLE),
                [id],
                customer_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("customer {}", id)))?;
        Ok(serde_json::to_value(customer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing;

    #[test]
    fn test_save_and_update_contacts() {
        let conn = testing::connection();
        let customers = Customers::new(&conn);

        let id = customers.save(&NewCustomer::named("Mesa 4"), "ana").expect("insert");
        let updated = customers
            .save(
                &NewCustomer {
                    name: " Mesa 4 ".into(),
                    phone: Some("600 000 000".into()),
                    email: Some("mesa4@example.com".into()),
                    notes: Some("  ".into()),
                },
                "ana",
            )
            .expect("update");
        assert_eq!(id, updated);

        let found = customers.find("Mesa 4").expect("find").expect("present");
        assert_eq!(found.phone.as_deref(), Some("600 000 000"));
        assert_eq!(found.notes, None);
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 2);
    }

    #[test]
    fn test_soft_delete() {
        let conn = testing::connection();
        let customers = Customers::new(&conn);
        customers.save(&NewCustomer::named("Luis"), "ana").expect("insert");

        assert!(customers.delete("Luis", "ana").expect("delete"));
        assert!(!customers.delete("Luis", "ana").expect("again"));
        assert!(customers.get_all(false).expect("list").is_empty());
        assert_eq!(customers.get_all(true).expect("list").len(), 1);
    }

    #[test]
    fn test_invalid_input() {
        let conn = testing::connection();
        let customers = Customers::new(&conn);
        let bad_email = NewCustomer {
            email: Some("nope".into()),
            ..NewCustomer::named("Luis")
        };
        assert!(matches!(customers.save(&bad_email, "ana"), Err(Error::Validation(_))));
        assert!(customers
            .save(&NewCustomer::named("x".repeat(101)), "ana")
            .is_err());
        assert!(customers.save(&NewCustomer::named("x".repeat(100)), "ana").is_ok());
    }
}
