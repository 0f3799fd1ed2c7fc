//! One-shot import of the legacy plaintext JSON data files.
//!
//! The general document is a seven element array:
//! `[products, pending_receipts, customers, waiters, tax_percent, password, printers]`.
//! Yearly documents hold twelve monthly lists of receipts. Legacy amounts are
//! floating point and rounded to cents. Legacy prices already include VAT and
//! a legacy ticket's total is its line sum, so imported receipts carry
//! [`LEGACY_TAX_RATE`] and keep the amount actually charged.

use crate::error::{Error, Result};
use crate::repo::{NewCustomer, NewProduct, NewReceiptLine, NewWaiter, Printers, Receipt};
use crate::storage::Session;
use crate::types::{Family, Money, ReceiptStatus, TaxRate};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Actor recorded in the audit trail for imported rows.
pub const IMPORT_ACTOR: &str = "legacy-import";

/// Customer name the legacy till used for anonymous tickets.
pub const ANONYMOUS_HEADER: &str = "Bar Robledo - BR2010";

/// Waiter recorded when a legacy ticket has none.
pub const UNKNOWN_WAITER: &str = "(unknown)";

/// Tax snapshot on imported receipts: prices were entered VAT-inclusive.
pub const LEGACY_TAX_RATE: TaxRate = TaxRate::from_basis_points(0);

/// Legacy date format, local time.
pub const LEGACY_DATE_FORMAT: &str = "%d/%m/%Y - %H:%M:%S";

/// A product in the legacy general document.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyProduct {
    /// Name.
    pub nombre: String,
    /// Price in euros.
    pub precio: f64,
    /// Family name.
    pub familia: String,
}

/// A legacy receipt line: `[quantity, name, price, family]`.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyLine(pub i64, pub String, pub f64, pub String);

/// A legacy receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyReceipt {
    /// Lines.
    pub pedido: Vec<LegacyLine>,
    /// Customer name or the anonymous header.
    #[serde(default)]
    pub nombre: String,
    /// Sale date.
    pub fecha: String,
    /// Status name.
    pub estado: String,
    /// Printed flag.
    #[serde(default)]
    pub impreso: bool,
    /// Waiter name.
    #[serde(default)]
    pub camarero: String,
}

/// The legacy general data document.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyGeneral(
    pub Vec<LegacyProduct>,
    pub Vec<LegacyReceipt>,
    pub Vec<String>,
    pub Vec<String>,
    pub f64,
    pub String,
    pub Vec<String>,
);

/// A legacy yearly receipts document: twelve monthly lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LegacyYear(pub Vec<Vec<LegacyReceipt>>);

/// What an import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Products saved.
    pub products: usize,
    /// Customers saved.
    pub customers: usize,
    /// Waiters saved.
    pub waiters: usize,
    /// Receipts saved.
    pub receipts: usize,
    /// Receipt lines dropped for a non-positive quantity.
    pub skipped_lines: usize,
}

/// Parse the general document.
pub fn parse_general(json: &str) -> Result<LegacyGeneral> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a yearly receipts document.
pub fn parse_year(json: &str) -> Result<LegacyYear> {
    let year: LegacyYear = serde_json::from_str(json)?;
    if year.0.len() > 12 {
        return Err(Error::Encoding(format!(
            "yearly document has {} months",
            year.0.len()
        )));
    }
    Ok(year)
}

/// Read and parse a general document from disk.
pub fn read_general(path: &Path) -> Result<LegacyGeneral> {
    parse_general(&fs::read_to_string(path)?)
}

/// Read and parse a yearly document from disk.
pub fn read_year(path: &Path) -> Result<LegacyYear> {
    parse_year(&fs::read_to_string(path)?)
}

/// Map a legacy family name.
pub fn map_family(name: &str) -> Family {
    match name.trim().to_lowercase().as_str() {
        "bebida" | "bebidas" => Family::Drink,
        "comida" | "comidas" => Family::Food,
        "varios" => Family::Misc,
        "otros" => Family::Other,
        other => {
            tracing::warn!(family = other, "unknown legacy family, filed under other");
            Family::Other
        }
    }
}

/// Map a legacy status name.
pub fn map_status(name: &str) -> Result<ReceiptStatus> {
    match name.trim().to_lowercase().as_str() {
        "efectivo" => Ok(ReceiptStatus::PaidCash),
        "tarjeta" => Ok(ReceiptStatus::PaidCard),
        "pendiente" | "nuevo" => Ok(ReceiptStatus::Pending),
        other => Err(Error::Validation(format!("unknown legacy status: {:?}", other))),
    }
}

/// Parse a legacy date in the given zone.
pub fn parse_date<Tz: TimeZone>(text: &str, zone: &Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), LEGACY_DATE_FORMAT)
        .map_err(|e| Error::Validation(format!("invalid legacy date {:?}: {}", text, e)))?;
    match zone.from_local_datetime(&naive).earliest() {
        Some(t) => Ok(t.with_timezone(&Utc)),
        // Inside a daylight saving gap; the wall clock time never happened.
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}

fn customer_of(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty() && name != ANONYMOUS_HEADER).then(|| name.to_string())
}

fn convert_receipt(legacy: &LegacyReceipt, report: &mut ImportReport) -> Result<Receipt> {
    let mut lines = Vec::with_capacity(legacy.pedido.len());
    for LegacyLine(quantity, name, price, family) in &legacy.pedido {
        let Ok(quantity) = u32::try_from(*quantity) else {
            report.skipped_lines += 1;
            continue;
        };
        if quantity == 0 {
            report.skipped_lines += 1;
            continue;
        }
        lines.push(NewReceiptLine::new(
            name.trim(),
            quantity,
            Money::from_f64(*price)?,
            map_family(family),
        ));
    }

    let waiter = match legacy.camarero.trim() {
        "" => UNKNOWN_WAITER,
        name => name,
    };
    let mut receipt = Receipt::new(waiter, customer_of(&legacy.nombre), LEGACY_TAX_RATE, lines)?;
    receipt.timestamp = parse_date(&legacy.fecha, &Local)?;
    receipt.status = map_status(&legacy.estado)?;
    receipt.printed = legacy.impreso;
    Ok(receipt)
}

/// Write legacy data into the store inside the caller's session.
///
/// Either everything is imported or, if any record is rejected, the session
/// rolls back and nothing is.
pub fn import(
    session: &Session<'_>,
    general: Option<&LegacyGeneral>,
    years: &[LegacyYear],
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    if let Some(LegacyGeneral(products, pending, customers, waiters, iva, password, printers)) = general {
        let config = session.configuration();
        config.set_tax_rate(TaxRate::from_percent(*iva)?)?;
        if !password.is_empty() {
            config.set_password(password)?;
        }
        config.set_printers(&Printers {
            main: printers.first().cloned().unwrap_or_default(),
            kitchen: printers.get(1).cloned().unwrap_or_default(),
        })?;

        for product in products {
            let new = NewProduct::new(
                product.nombre.trim(),
                Money::from_f64(product.precio)?,
                map_family(&product.familia),
            );
            session.products().save(&new, IMPORT_ACTOR)?;
            report.products += 1;
        }

        for name in customers.iter().filter_map(|n| customer_of(n)) {
            session.customers().save(&NewCustomer::named(name), IMPORT_ACTOR)?;
            report.customers += 1;
        }

        for name in waiters.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            session.waiters().save(&NewWaiter::named(name), IMPORT_ACTOR)?;
            report.waiters += 1;
        }

        for legacy in pending {
            let receipt = convert_receipt(legacy, &mut report)?;
            session.receipts().save(&receipt, IMPORT_ACTOR)?;
            report.receipts += 1;
        }
    }

    for LegacyYear(months) in years {
        for legacy in months.iter().flatten() {
            let receipt = convert_receipt(legacy, &mut report)?;
            session.receipts().save(&receipt, IMPORT_ACTOR)?;
            report.receipts += 1;
        }
    }

    tracing::info!(
        products = report.products,
        customers = report.customers,
        waiters = report.waiters,
        receipts = report.receipts,
        skipped_lines = report.skipped_lines,
        "legacy import complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, Timelike};

    const GENERAL: &str = r#"[
        [{"nombre": "Cafe", "precio": 1.2, "familia": "Bebida"},
         {"nombre": "Tostada", "precio": 2.5, "familia": "Comida"}],
        [{"pedido": [[2, "Cafe", 1.2, "Bebida"], [0, "Agua", 1.0, "Bebida"]],
          "nombre": "Mesa 4", "fecha": "05/03/2023 - 10:15:00",
          "estado": "pendiente", "impreso": false, "camarero": "Pepe"}],
        ["Mesa 4", "Bar Robledo - BR2010"],
        ["Pepe", ""],
        21.0,
        "1234",
        ["EPSON", "Cocina"]
    ]"#;

    #[test]
    fn test_parse_general() {
        let LegacyGeneral(products, pending, customers, waiters, iva, password, printers) =
            parse_general(GENERAL).expect("parse");
        assert_eq!(products.len(), 2);
        assert_eq!(pending[0].pedido.len(), 2);
        assert_eq!(customers.len(), 2);
        assert_eq!(waiters.len(), 2);
        assert_eq!(iva, 21.0);
        assert_eq!(password, "1234");
        assert_eq!(printers, vec!["EPSON", "Cocina"]);
    }

    #[test]
    fn test_parse_year() {
        let json = r#"[[{"pedido": [[1, "Cafe", 1.2, "Bebida"]], "nombre": "Bar Robledo - BR2010",
                         "fecha": "02/01/2023 - 09:00:00", "estado": "efectivo"}],
                       [], [], [], [], [], [], [], [], [], [], []]"#;
        let year = parse_year(json).expect("parse");
        assert_eq!(year.0.len(), 12);
        assert_eq!(year.0[0][0].camarero, "");
        assert!(!year.0[0][0].impreso);

        let too_long = format!("[{}]", vec!["[]"; 13].join(","));
        assert!(parse_year(&too_long).is_err());
    }

    #[test]
    fn test_mappings() {
        assert_eq!(map_family("Bebida"), Family::Drink);
        assert_eq!(map_family("Comida"), Family::Food);
        assert_eq!(map_family("Varios"), Family::Misc);
        assert_eq!(map_family("Otros"), Family::Other);
        assert_eq!(map_family("Postres"), Family::Other);

        assert_eq!(map_status("efectivo").expect("status"), ReceiptStatus::PaidCash);
        assert_eq!(map_status("tarjeta").expect("status"), ReceiptStatus::PaidCard);
        assert_eq!(map_status("pendiente").expect("status"), ReceiptStatus::Pending);
        assert_eq!(map_status("Nuevo").expect("status"), ReceiptStatus::Pending);
        assert!(map_status("fiado").is_err());

        assert_eq!(customer_of(ANONYMOUS_HEADER), None);
        assert_eq!(customer_of("  "), None);
        assert_eq!(customer_of("Mesa 4"), Some("Mesa 4".into()));
    }

    #[test]
    fn test_parse_date() {
        let t = parse_date("05/03/2023 - 10:15:30", &Utc).expect("date");
        assert_eq!((t.year(), t.month(), t.day()), (2023, 3, 5));
        assert_eq!((t.hour(), t.minute(), t.second()), (10, 15, 30));

        let madrid = FixedOffset::east_opt(3600).expect("offset");
        let local = parse_date("05/03/2023 - 10:15:30", &madrid).expect("date");
        assert_eq!(local.hour(), 9);

        assert!(parse_date("2023-03-05", &Utc).is_err());
    }

    #[test]
    fn test_convert_receipt() {
        let LegacyGeneral(_, pending, ..) = parse_general(GENERAL).expect("parse");
        let mut report = ImportReport::default();
        let receipt = convert_receipt(&pending[0], &mut report).expect("convert");

        assert_eq!(report.skipped_lines, 1);
        assert_eq!(receipt.lines.len(), 1);
        assert_eq!(receipt.subtotal, Money::from_cents(240));
        assert_eq!(receipt.tax_rate, LEGACY_TAX_RATE);
        assert_eq!(receipt.total, Money::from_cents(240));
        assert_eq!(receipt.customer_name.as_deref(), Some("Mesa 4"));
        assert_eq!(receipt.waiter_name, "Pepe");
        assert_eq!(receipt.status, ReceiptStatus::Pending);
        receipt.check_totals().expect("consistent");
    }
}
