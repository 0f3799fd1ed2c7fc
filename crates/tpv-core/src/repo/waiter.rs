//! Waiters.

use super::{clean_actor, clean_name, clean_optional, time_column, AuditLog, MAX_SHORT_NAME};
use crate::error::{Error, Result};
use crate::types::{encode_time, now, AuditAction, RecordState};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const TABLE: &str = "waiters";

const COLUMNS: &str = "id, name, code, active, created_at, modified_at";

/// Waiter data supplied by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWaiter {
    /// Name, unique among active waiters.
    pub name: String,
    /// Optional short login code, unique among active waiters.
    pub code: Option<String>,
}

impl NewWaiter {
    /// A waiter with no code.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
        }
    }
}

/// A stored waiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    /// Row id.
    pub id: i64,
    /// Name.
    pub name: String,
    /// Login code.
    pub code: Option<String>,
    /// Soft-delete state.
    pub state: RecordState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub modified_at: DateTime<Utc>,
}

fn waiter_from_row(row: &Row<'_>) -> rusqlite::Result<Waiter> {
    Ok(Waiter {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        state: row.get(3)?,
        created_at: time_column(row, 4)?,
        modified_at: time_column(row, 5)?,
    })
}

/// Waiter repository.
pub struct Waiters<'a> {
    conn: &'a Connection,
}

impl<'a> Waiters<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a waiter, or update (and reactivate) the one with this name.
    pub fn save(&self, waiter: &NewWaiter, actor: &str) -> Result<i64> {
        let name = clean_name("waiter", &waiter.name, MAX_SHORT_NAME)?;
        let actor = clean_actor(actor)?;
        let code = clean_optional(waiter.code.as_deref());
        let existing = self.find_any(&name)?;

        if let Some(code) = &code {
            let holder: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM waiters WHERE code = ? AND active = 1",
                    [code],
                    |row| row.get(0),
                )
                .optional()?;
            if holder.is_some() && holder != existing.as_ref().map(|w| w.id) {
                return Err(Error::Validation(format!("waiter code {:?} already in use", code)));
            }
        }

        let audit = AuditLog::new(self.conn);
        let stamp = encode_time(&now());

        let Some(existing) = existing else {
            self.conn.execute(
                "INSERT INTO waiters (name, code, active, created_at, modified_at) VALUES (?, ?, ?, ?, ?)",
                params![name, code, RecordState::Active, stamp, stamp],
            )?;
            let id = self.conn.last_insert_rowid();
            let after = self.snapshot(id)?;
            audit.record(TABLE, AuditAction::Insert, id, None, Some(&after), actor)?;
            tracing::info!(id, "waiter created");
            return Ok(id);
        };

        self.conn.execute(
            "UPDATE waiters SET code = ?, active = ?, modified_at = ? WHERE id = ?",
            params![code, RecordState::Active, stamp, existing.id],
        )?;
        let before = serde_json::to_value(&existing)?;
        let after = self.snapshot(existing.id)?;
        audit.record(TABLE, AuditAction::Update, existing.id, Some(&before), Some(&after), actor)?;
        Ok(existing.id)
    }

    /// List waiters ordered by name.
    pub fn get_all(&self, include_inactive: bool) -> Result<Vec<Waiter>> {
        let filter = if include_inactive { "" } else { "WHERE active = 1" };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} {} ORDER BY name, id",
            COLUMNS, TABLE, filter
        ))?;
        let waiters = stmt
            .query_map([], waiter_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(waiters)
    }

    /// The active waiter with this name.
    pub fn find(&self, name: &str) -> Result<Option<Waiter>> {
        self.find_where("name = ? AND active = 1", name.trim())
    }

    /// The active waiter with this code.
    pub fn find_by_code(&self, code: &str) -> Result<Option<Waiter>> {
        self.find_where("code = ? AND active = 1", code.trim())
    }

    /// Deactivate the waiter with this name. `false` if none is active.
    pub fn delete(&self, name: &str, actor: &str) -> Result<bool> {
        let actor = clean_actor(actor)?;
        let Some(existing) = self.find(name)? else {
            return Ok(false);
        };

        self.conn.execute(
            "UPDATE waiters SET active = ?, modified_at = ? WHERE id = ?",
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
        tracing::info!(id = existing.id, "waiter deactivated");
        Ok(true)
    }

    fn find_where(&self, condition: &str, arg: &str) -> Result<Option<Waiter>> {
        let waiter = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE {}", COLUMNS, TABLE, condition),
                [arg],
                waiter_from_row,
            )
            .optional()?;
        Ok(waiter)
    }

    fn find_any(&self, name: &str) -> Result<Option<Waiter>> {
        self.find_where("name = ? ORDER BY active DESC, id DESC LIMIT 1", name)
    }

    fn snapshot(&self, id: i64) -> Result<serde_json::Value> {
        let waiter = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, TABLE),
                [id],
                waiter_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("waiter {}", id)))?;
        Ok(serde_json::to_value(waiter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing;

    #[test]
    fn test_save_find_delete() {
        let conn = testing::connection();
        let waiters = Waiters::new(&conn);

        let id = waiters
            .save(
                &NewWaiter {
                    name: "Pepe".into(),
                    code: Some("01".into()),
                },
                "admin",
            )
            .expect("insert");
        assert_eq!(waiters.find_by_code("01").expect("find").map(|w| w.id), Some(id));

        assert!(waiters.delete("Pepe", "admin").expect("delete"));
        assert!(waiters.get_all(false).expect("list").is_empty());
        assert_eq!(waiters.get_all(true).expect("list").len(), 1);
        assert!(waiters.find_by_code("01").expect("find").is_none());
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 2);
    }

    #[test]
    fn test_code_must_be_unique_among_active() {
        let conn = testing::connection();
        let waiters = Waiters::new(&conn);
        let with_code = |name: &str| NewWaiter {
            name: name.into(),
            code: Some("07".into()),
        };

        waiters.save(&with_code("Pepe"), "admin").expect("insert");
        // Re-saving the holder keeps its own code.
        waiters.save(&with_code("Pepe"), "admin").expect("update");
        assert!(matches!(
            waiters.save(&with_code("Juan"), "admin"),
            Err(Error::Validation(_))
        ));

        waiters.delete("Pepe", "admin").expect("delete");
        waiters.save(&with_code("Juan"), "admin").expect("code free again");
    }
}
