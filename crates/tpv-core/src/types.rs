//! Value types shared by the repositories.
//!
//! Money is kept in integer cents and tax rates in basis points so receipt
//! totals can be checked for exact equality.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format persisted in the store.
///
/// Fixed width, so text order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Current time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Encode a timestamp for storage.
pub fn encode_time(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Decode a stored timestamp.
pub fn decode_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Encoding(format!("invalid timestamp {:?}: {}", s, e)))
}

fn conversion_error(e: Error) -> FromSqlError {
    FromSqlError::Other(Box::new(e))
}

/// An amount of money in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Create from a number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Number of cents.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Round a floating point amount (legacy data) to the nearest cent.
    pub fn from_f64(amount: f64) -> Result<Self> {
        if !amount.is_finite() || amount.abs() > (i64::MAX / 100) as f64 {
            return Err(Error::Validation(format!("amount out of range: {}", amount)));
        }
        Ok(Self((amount * 100.0).round() as i64))
    }

    /// True if the amount is below zero.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply by a quantity, `None` on overflow.
    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Add, `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse `"1.20"`, `"1.2"`, `"3"` or `"-0.50"`. At most two decimals.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid amount: {:?}", s));
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once(['.', ',']).unwrap_or((digits, ""));
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Integer(self.0)))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money)
    }
}

/// A tax rate in basis points (2100 = 21%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Default rate for new stores (21%).
    pub const DEFAULT: TaxRate = TaxRate(2100);

    /// Create from basis points.
    pub const fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    /// Basis points.
    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// Create from a percentage (legacy data stores `21.0`).
    pub fn from_percent(percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=1000.0).contains(&percent) {
            return Err(Error::Validation(format!("invalid tax rate: {}", percent)));
        }
        Ok(Self((percent * 100.0).round() as u32))
    }

    /// Tax owed on an amount, rounded half away from zero to the cent.
    ///
    /// `None` when the tax does not fit in an amount.
    pub fn checked_tax_on(self, amount: Money) -> Option<Money> {
        let scaled = i128::from(amount.cents().unsigned_abs()) * i128::from(self.0);
        let rounded = i64::try_from((scaled + 5_000) / 10_000).ok()?;
        Some(Money::from_cents(if amount.is_negative() { -rounded } else { rounded }))
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for TaxRate {
    type Err = Error;

    /// Parse a percentage such as `"21"` or `"10.5"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_end_matches('%');
        let as_money: Money = s
            .parse()
            .map_err(|_| Error::Validation(format!("invalid tax rate: {:?}", s)))?;
        u32::try_from(as_money.cents())
            .map(TaxRate)
            .map_err(|_| Error::Validation(format!("invalid tax rate: {:?}", s)))
    }
}

impl ToSql for TaxRate {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Integer(i64::from(self.0))))
    }
}

impl FromSql for TaxRate {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let bp = i64::column_result(value)?;
        u32::try_from(bp)
            .map(TaxRate)
            .map_err(|_| FromSqlError::OutOfRange(bp))
    }
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stored text form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("unknown ", stringify!($name), ": {:?}"),
                        other
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.as_str().as_bytes())))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(conversion_error)
            }
        }
    };
}

/// Product family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Drinks.
    Drink,
    /// Food.
    Food,
    /// Anything else on the menu.
    Other,
    /// Ad-hoc amounts rung up without a catalogued product.
    Misc,
}

text_enum!(Family {
    Drink => "drink",
    Food => "food",
    Other => "other",
    Misc => "misc",
});

/// Receipt payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Open ticket, still editable.
    Pending,
    /// Paid in cash. Terminal.
    PaidCash,
    /// Paid by card. Terminal.
    PaidCard,
}

text_enum!(ReceiptStatus {
    Pending => "pending",
    PaidCash => "paid_cash",
    PaidCard => "paid_card",
});

impl ReceiptStatus {
    /// True for the terminal paid states.
    pub fn is_paid(self) -> bool {
        !matches!(self, ReceiptStatus::Pending)
    }

    /// Only Pending may move, and only to a paid state.
    pub fn can_transition_to(self, next: ReceiptStatus) -> bool {
        self == ReceiptStatus::Pending && next.is_paid()
    }
}

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Row created.
    Insert,
    /// Row changed, including reactivation of a catalogue row.
    Update,
    /// Row removed, or deactivated for catalogue rows.
    Delete,
}

text_enum!(AuditAction {
    Insert => "insert",
    Update => "update",
    Delete => "delete",
});

/// Soft-delete state of catalogue rows.
///
/// Persisted as the `active` column (1 = Active, 0 = Inactive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Visible to default reads.
    #[default]
    Active,
    /// Soft-deleted; kept so history and audit stay resolvable.
    Inactive,
}

impl RecordState {
    /// True when the row is active.
    pub fn is_active(self) -> bool {
        self == RecordState::Active
    }
}

impl ToSql for RecordState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Integer(i64::from(self.is_active()))))
    }
}

impl FromSql for RecordState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match i64::column_result(value)? {
            0 => RecordState::Inactive,
            _ => RecordState::Active,
        })
    }
}
