//! Product catalogue with price history.

use super::{clean_actor, clean_name, time_column, AuditLog, MAX_SHORT_NAME};
use crate::error::{Error, Result};
use crate::types::{encode_time, now, AuditAction, Family, Money, RecordState};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const TABLE: &str = "products";

const COLUMNS: &str = "id, name, price, family, active, created_at, modified_at, modified_by";

/// Product data supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Display name, unique among active products.
    pub name: String,
    /// Unit price.
    pub price: Money,
    /// Menu family.
    pub family: Family,
}

impl NewProduct {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, price: Money, family: Family) -> Self {
        Self {
            name: name.into(),
            price,
            family,
        }
    }
}

/// A stored product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Money,
    /// Menu family.
    pub family: Family,
    /// Soft-delete state.
    pub state: RecordState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub modified_at: DateTime<Utc>,
    /// Actor of the last change.
    pub modified_by: Option<String>,
}

/// A recorded price change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceHistoryEntry {
    /// Row id.
    pub id: i64,
    /// Product the change applies to.
    pub product_id: i64,
    /// Price before.
    pub old_price: Money,
    /// Price after.
    pub new_price: Money,
    /// When.
    pub timestamp: DateTime<Utc>,
    /// Who.
    pub actor: Option<String>,
}

/// Selection for [`Products::get_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    /// Only this family.
    pub family: Option<Family>,
    /// Also return deactivated products.
    pub include_inactive: bool,
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        family: row.get(3)?,
        state: row.get(4)?,
        created_at: time_column(row, 5)?,
        modified_at: time_column(row, 6)?,
        modified_by: row.get(7)?,
    })
}

/// Product repository.
pub struct Products<'a> {
    conn: &'a Connection,
}

impl<'a> Products<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a product, or update the one with the same name.
    ///
    /// An inactive product with the same name is reactivated rather than
    /// duplicated. A price change is recorded in the price history before
    /// the row is updated. Returns the product id.
    pub fn save(&self, product: &NewProduct, actor: &str) -> Result<i64> {
        let name = clean_name("product", &product.name, MAX_SHORT_NAME)?;
        let actor = clean_actor(actor)?;
        if product.price.is_negative() {
            return Err(Error::Validation(format!(
                "price of {} cannot be negative",
                name
            )));
        }

        let audit = AuditLog::new(self.conn);
        let stamp = encode_time(&now());

        let Some(existing) = self.find_any(&name)? else {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (name, price, family, active, created_at, modified_at, modified_by) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    TABLE
                ),
                params![name, product.price, product.family, RecordState::Active, stamp, stamp, actor],
            )?;
            let id = self.conn.last_insert_rowid();
            let after = self.snapshot(id)?;
            audit.record(TABLE, AuditAction::Insert, id, None, Some(&after), actor)?;
            tracing::info!(id, family = %product.family, "product created");
            return Ok(id);
        };

        if existing.price != product.price {
            self.conn.execute(
                "INSERT INTO price_history (product_id, old_price, new_price, timestamp, actor) \
                 VALUES (?, ?, ?, ?, ?)",
                params![existing.id, existing.price, product.price, stamp, actor],
            )?;
            tracing::debug!(
                id = existing.id,
                old = %existing.price,
                new = %product.price,
                "price changed"
            );
        }

        self.conn.execute(
            &format!(
                "UPDATE {} SET price = ?, family = ?, active = ?, modified_at = ?, modified_by = ? WHERE id = ?",
                TABLE
            ),
            params![product.price, product.family, RecordState::Active, stamp, actor, existing.id],
        )?;

        let before = serde_json::to_value(&existing)?;
        let after = self.snapshot(existing.id)?;
        audit.record(TABLE, AuditAction::Update, existing.id, Some(&before), Some(&after), actor)?;
        Ok(existing.id)
    }

    /// List products ordered by name.
    pub fn get_all(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {} FROM {} WHERE 1 = 1", COLUMNS, TABLE);
        let mut args: Vec<SqlValue> = Vec::new();

        if !filter.include_inactive {
            sql.push_str(" AND active = 1");
        }
        if let Some(family) = filter.family {
            sql.push_str(" AND family = ?");
            args.push(SqlValue::Text(family.as_str().to_string()));
        }
        sql.push_str(" ORDER BY name, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(args), product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// The active product with this name.
    pub fn find(&self, name: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE name = ? AND active = 1", COLUMNS, TABLE),
                [name.trim()],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    /// A product by id, active or not.
    pub fn get(&self, id: i64) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, TABLE),
                [id],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    /// Deactivate the product with this name.
    ///
    /// Returns `false` if there is no active product by that name.
    pub fn delete(&self, name: &str, actor: &str) -> Result<bool> {
        let actor = clean_actor(actor)?;
        let Some(existing) = self.find(name)? else {
            return Ok(false);
        };

        self.conn.execute(
            &format!(
                "UPDATE {} SET active = ?, modified_at = ?, modified_by = ? WHERE id = ?",
                TABLE
            ),
            params![RecordState::Inactive, encode_time(&now()), actor, existing.id],
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
        tracing::info!(id = existing.id, "product deactivated");
        Ok(true)
    }

    /// Price changes for the product with this name, oldest first.
    ///
    /// Covers the active product, or the most recent one if none is active.
    pub fn price_history(&self, name: &str) -> Result<Vec<PriceHistoryEntry>> {
        let Some(product) = self.find_any(name.trim())? else {
            return Err(Error::NotFound(format!("product {:?}", name.trim())));
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, old_price, new_price, timestamp, actor \
             FROM price_history WHERE product_id = ? ORDER BY id",
        )?;
        let entries = stmt
            .query_map([product.id], |row| {
                Ok(PriceHistoryEntry {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    old_price: row.get(2)?,
                    new_price: row.get(3)?,
                    timestamp: time_column(row, 4)?,
                    actor: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Active row by name, else the newest inactive one.
    fn find_any(&self, name: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE name = ? ORDER BY active DESC, id DESC LIMIT 1",
                    COLUMNS, TABLE
                ),
                [name],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    fn snapshot(&self, id: i64) -> Result<serde_json::Value> {
        let product = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("product {}", id)))?;
        Ok(serde_json::to_value(product)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{testing, AuditFilter};

    fn coffee(cents: i64) -> NewProduct {
        NewProduct::new("Coffee", Money::from_cents(cents), Family::Drink)
    }

    #[test]
    fn test_save_insert_then_update() {
        let conn = testing::connection();
        let products = Products::new(&conn);

        let id = products.save(&coffee(120), "ana").expect("insert");
        let again = products.save(&coffee(150), "ana").expect("update");
        assert_eq!(id, again);

        let all = products.get_all(&ProductFilter::default()).expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].price, Money::from_cents(150));
        assert_eq!(all[0].modified_by.as_deref(), Some("ana"));

        let history = products.price_history("Coffee").expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_price, Money::from_cents(120));
        assert_eq!(history[0].new_price, Money::from_cents(150));

        let audit = AuditLog::new(&conn).entries(&AuditFilter::default()).expect("audit");
        let actions: Vec<_> = audit.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Update, AuditAction::Insert]);
    }

    #[test]
    fn test_same_price_writes_no_history() {
        let conn = testing::connection();
        let products = Products::new(&conn);
        products.save(&coffee(120), "ana").expect("insert");
        products
            .save(&NewProduct::new("Coffee", Money::from_cents(120), Family::Other), "ana")
            .expect("update family");

        assert!(products.price_history("Coffee").expect("history").is_empty());
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 2);
        assert_eq!(
            products.find("Coffee").expect("find").map(|p| p.family),
            Some(Family::Other)
        );
    }

    #[test]
    fn test_soft_delete_and_reactivate() {
        let conn = testing::connection();
        let products = Products::new(&conn);
        let id = products.save(&coffee(120), "ana").expect("insert");

        assert!(products.delete("Coffee", "ana").expect("delete"));
        assert!(!products.delete("Coffee", "ana").expect("second delete"));
        assert!(!products.delete("Tea", "ana").expect("missing"));
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 2);

        assert!(products.find("Coffee").expect("find").is_none());
        assert!(products.get_all(&ProductFilter::default()).expect("list").is_empty());
        let all = products
            .get_all(&ProductFilter {
                include_inactive: true,
                ..Default::default()
            })
            .expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, RecordState::Inactive);

        let revived = products.save(&coffee(130), "ana").expect("reactivate");
        assert_eq!(revived, id);
        assert_eq!(products.find("Coffee").expect("find").map(|p| p.state), Some(RecordState::Active));
        assert_eq!(products.price_history("Coffee").expect("history").len(), 1);
    }

    #[test]
    fn test_family_filter() {
        let conn = testing::connection();
        let products = Products::new(&conn);
        products.save(&coffee(120), "ana").expect("insert");
        products
            .save(&NewProduct::new("Toast", Money::from_cents(250), Family::Food), "ana")
            .expect("insert");

        let food = products
            .get_all(&ProductFilter {
                family: Some(Family::Food),
                include_inactive: false,
            })
            .expect("list");
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].name, "Toast");
    }

    #[test]
    fn test_validation() {
        let conn = testing::connection();
        let products = Products::new(&conn);

        assert!(matches!(
            products.save(&coffee(-1), "ana"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            products.save(&NewProduct::new(" ", Money::ZERO, Family::Misc), "ana"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            products.price_history("Nothing"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(AuditLog::new(&conn).count().expect("count"), 0);
    }
}
