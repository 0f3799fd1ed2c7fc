//! Append-only audit trail.

use super::{clean_actor, time_column};
use crate::error::Result;
use crate::types::{encode_time, now, AuditAction};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use serde_json::Value;

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// Row id.
    pub id: i64,
    /// Table the change applied to.
    pub table_name: String,
    /// Kind of change.
    pub action: AuditAction,
    /// Id of the changed row.
    pub record_id: i64,
    /// Row state before the change.
    pub before: Option<Value>,
    /// Row state after the change.
    pub after: Option<Value>,
    /// Who made the change.
    pub actor: String,
    /// When the change was made.
    pub timestamp: DateTime<Utc>,
}

/// Selection for [`AuditLog::entries`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only this table.
    pub table: Option<String>,
    /// Only this record (usually with `table`).
    pub record_id: Option<i64>,
    /// At most this many entries.
    pub limit: Option<u32>,
}

/// Audit log over an open connection. Insert and read only.
pub struct AuditLog<'a> {
    conn: &'a Connection,
}

fn parse_snapshot(text: Option<String>) -> rusqlite::Result<Option<Value>> {
    text.map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        table_name: row.get(1)?,
        action: row.get(2)?,
        record_id: row.get(3)?,
        before: parse_snapshot(row.get(4)?)?,
        after: parse_snapshot(row.get(5)?)?,
        actor: row.get(6)?,
        timestamp: time_column(row, 7)?,
    })
}

impl<'a> AuditLog<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one entry. Returns its id.
    pub fn record(
        &self,
        table: &str,
        action: AuditAction,
        record_id: i64,
        before: Option<&Value>,
        after: Option<&Value>,
        actor: &str,
    ) -> Result<i64> {
        let actor = clean_actor(actor)?;
        let before = before.map(serde_json::to_string).transpose()?;
        let after = after.map(serde_json::to_string).transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO audit_log
            (table_name, action, record_id, before_snapshot, after_snapshot, actor, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![table, action, record_id, before, after, actor, encode_time(&now())],
        )?;

        tracing::debug!(table, %action, record_id, "audit entry recorded");
        Ok(self.conn.last_insert_rowid())
    }

    /// Read entries, newest first.
    pub fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut sql = String::from(
            "SELECT id, table_name, action, record_id, before_snapshot, after_snapshot, actor, timestamp \
             FROM audit_log WHERE 1 = 1",
        );
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(table) = &filter.table {
            sql.push_str(" AND table_name = ?");
            args.push(SqlValue::Text(table.clone()));
        }
        if let Some(record_id) = filter.record_id {
            sql.push_str(" AND record_id = ?");
            args.push(SqlValue::Integer(record_id));
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            args.push(SqlValue::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(args), entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of entries in the log.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
