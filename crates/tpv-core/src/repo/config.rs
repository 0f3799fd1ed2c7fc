//! Key/value configuration stored inside the encrypted store.
//!
//! Values are JSON text so structured settings (printers) and scalars (tax
//! rate) share one table.

use super::time_column;
use crate::crypto;
use crate::error::{Error, Result};
use crate::logging::sanitize_for_log;
use crate::types::{encode_time, now, TaxRate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tax rate in basis points.
pub const TAX_RATE_KEY: &str = "tax_rate";

/// Operator password hash.
pub const PASSWORD_HASH_KEY: &str = "password_hash";

/// Printer names.
pub const PRINTERS_KEY: &str = "printers";

/// One configuration row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationEntry {
    /// Setting name.
    pub key: String,
    /// Setting value.
    pub value: Value,
    /// Last change.
    pub modified_at: DateTime<Utc>,
}

/// Printers the till sends tickets to. Empty means not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printers {
    /// Receipt printer (also opens the cash drawer).
    #[serde(default)]
    pub main: String,
    /// Kitchen order printer.
    #[serde(default)]
    pub kitchen: String,
}

/// Configuration over an open connection.
pub struct Configuration<'a> {
    conn: &'a Connection,
}

impl<'a> Configuration<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Set a value, replacing any previous one.
    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Validation("configuration key cannot be empty".into()));
        }
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO configuration (key, value, modified_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, modified_at = excluded.modified_at",
            params![key, text, encode_time(&now())],
        )?;
        tracing::debug!(key, value = %sanitize_for_log(key, &text), "configuration set");
        Ok(())
    }

    /// A value, or `None` if unset.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM configuration WHERE key = ?",
                [key.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text.map(|t| serde_json::from_str(&t)).transpose()?)
    }

    /// Set a typed value.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, &serde_json::to_value(value)?)
    }

    /// A typed value, or `None` if unset.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All entries ordered by key.
    pub fn entries(&self) -> Result<Vec<ConfigurationEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, modified_at FROM configuration ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, time_column(row, 2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(key, text, modified_at)| {
                Ok(ConfigurationEntry {
                    value: serde_json::from_str(&text)?,
                    key,
                    modified_at,
                })
            })
            .collect()
    }

    /// Tax rate for new receipts, [`TaxRate::DEFAULT`] if unset.
    pub fn tax_rate(&self) -> Result<TaxRate> {
        Ok(self.get_as(TAX_RATE_KEY)?.unwrap_or_default())
    }

    /// Change the tax rate for new receipts.
    pub fn set_tax_rate(&self, rate: TaxRate) -> Result<()> {
        self.set_as(TAX_RATE_KEY, &rate)
    }

    /// Configured printers, empty if unset.
    pub fn printers(&self) -> Result<Printers> {
        Ok(self.get_as(PRINTERS_KEY)?.unwrap_or_default())
    }

    /// Change the configured printers.
    pub fn set_printers(&self, printers: &Printers) -> Result<()> {
        self.set_as(PRINTERS_KEY, printers)
    }

    /// Store a salted hash of the operator password.
    pub fn set_password(&self, password: &str) -> Result<()> {
        let hash = crypto::hash_password(password)?;
        self.set_as(PASSWORD_HASH_KEY, &hash)
    }

    /// Check the operator password. `false` when none is set.
    pub fn verify_password(&self, password: &str) -> Result<bool> {
        match self.get_as::<String>(PASSWORD_HASH_KEY)? {
            Some(stored) => crypto::verify_password(password, &stored),
            None => Ok(false),
        }
    }

    /// Whether an operator password is set.
    pub fn has_password(&self) -> Result<bool> {
        Ok(self.get(PASSWORD_HASH_KEY)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing;
    use serde_json::json;

    #[test]
    fn test_set_get_replace() {
        let conn = testing::connection();
        let config = Configuration::new(&conn);

        assert_eq!(config.get("theme").expect("get"), None);
        config.set("theme", &json!("dark")).expect("set");
        config.set("theme", &json!({"name": "light"})).expect("replace");
        assert_eq!(config.get("theme").expect("get"), Some(json!({"name": "light"})));
        assert_eq!(config.entries().expect("entries").len(), 1);
        assert!(config.set(" ", &json!(1)).is_err());
    }

    #[test]
    fn test_tax_rate_default_and_set() {
        let conn = testing::connection();
        let config = Configuration::new(&conn);

        assert_eq!(config.tax_rate().expect("rate"), TaxRate::DEFAULT);
        config
            .set_tax_rate(TaxRate::from_basis_points(1000))
            .expect("set");
        assert_eq!(config.tax_rate().expect("rate").basis_points(), 1000);
        assert_eq!(config.get(TAX_RATE_KEY).expect("raw"), Some(json!(1000)));
    }

    #[test]
    fn test_printers() {
        let conn = testing::connection();
        let config = Configuration::new(&conn);
        assert_eq!(config.printers().expect("printers"), Printers::default());

        let printers = Printers {
            main: "EPSON TM-T20".into(),
            kitchen: "Cocina".into(),
        };
        config.set_printers(&printers).expect("set");
        assert_eq!(config.printers().expect("printers"), printers);
    }

    #[test]
    fn test_password() {
        let conn = testing::connection();
        let config = Configuration::new(&conn);

        assert!(!config.has_password().expect("has"));
        assert!(!config.verify_password("1234").expect("verify"));

        config.set_password("1234").expect("set");
        assert!(config.has_password().expect("has"));
        assert!(config.verify_password("1234").expect("verify"));
        assert!(!config.verify_password("0000").expect("verify"));

        let stored = config.get_as::<String>(PASSWORD_HASH_KEY).expect("get").expect("set");
        assert!(!stored.contains("1234"));
    }

    #[test]
    fn test_type_mismatch_is_encoding_error() {
        let conn = testing::connection();
        let config = Configuration::new(&conn);
        config.set(TAX_RATE_KEY, &json!("lots")).expect("set");
        assert!(matches!(config.tax_rate(), Err(Error::Encoding(_))));
    }
}
