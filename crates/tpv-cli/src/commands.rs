//! CLI command implementations.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tpv_core::{
    crypto::SECRET_ENV_VAR,
    logging::sanitize_for_log,
    repo::{AuditFilter, ReceiptFilter},
    AuditEntry, Error, Family, Money, NewCustomer, NewProduct, NewReceiptLine, NewWaiter,
    ProductFilter, Receipt, ReceiptStatus, Store, StoreConfig, StoreKey, TaxRate,
};
use zeroize::Zeroizing;

/// Get password from user with secure input (masked).
fn get_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Build the store configuration from command-line paths.
pub fn store_config(data_dir: &str, backup_dir: Option<&str>, retention: usize) -> StoreConfig {
    StoreConfig {
        backup_dir: backup_dir.map(|dir| PathBuf::from(shellexpand::tilde(dir).to_string())),
        backup_retention: retention,
        ..StoreConfig::in_dir(shellexpand::tilde(data_dir).to_string())
    }
}

/// Read the secret from the environment, falling back to a masked prompt.
fn store_key() -> Result<StoreKey> {
    match StoreKey::from_env() {
        Ok(key) => Ok(key),
        Err(Error::NoSecret) => {
            let secret = Zeroizing::new(get_password("Store secret: ")?);
            StoreKey::derive(secret.as_bytes()).context("Invalid secret")
        }
        Err(e) => Err(e).with_context(|| format!("Invalid {}", SECRET_ENV_VAR)),
    }
}

fn open_store(config: &StoreConfig) -> Result<Store> {
    let key = store_key()?;
    Store::open(config, key).map_err(|e| {
        if e.is_unreadable() {
            anyhow::anyhow!("{}. Check {} and the store file.", e, SECRET_ENV_VAR)
        } else {
            anyhow::Error::new(e).context("Failed to open store")
        }
    })
}

fn parse_family(family: &str) -> Result<Family> {
    family.parse().context("Family must be drink, food, other or misc")
}

/// Split `NAME` or `NAME:QUANTITY`.
fn parse_line_spec(spec: &str) -> Result<(String, u32)> {
    match spec.rsplit_once(':') {
        Some((name, quantity)) => {
            let quantity = quantity
                .trim()
                .parse()
                .with_context(|| format!("Invalid quantity in {:?}", spec))?;
            Ok((name.trim().to_string(), quantity))
        }
        None => Ok((spec.trim().to_string(), 1)),
    }
}

fn print_receipt(receipt: &Receipt) {
    println!(
        "#{:<6} {}  {:<10} {:>10}  waiter: {}  customer: {}{}",
        receipt.id.unwrap_or_default(),
        receipt.timestamp.format("%Y-%m-%d %H:%M"),
        receipt.status,
        receipt.total,
        receipt.waiter_name,
        receipt.customer_name.as_deref().unwrap_or("-"),
        if receipt.printed { "  [printed]" } else { "" },
    );
}

/// Create the store, or check an existing one opens.
pub async fn init(config: &StoreConfig) -> Result<()> {
    let existed = config.store_path().exists();
    let store = open_store(config)?;

    if existed {
        println!("Store already exists: {}", store.path().display());
    } else {
        println!("Created store: {}", store.path().display());
        println!("Backups go to: {}", store.backups().backup_dir().display());
        println!("\nIMPORTANT: the store cannot be read without the secret.");
        println!("If you lose it, the data is LOST FOREVER.");
    }
    Ok(())
}

/// Print a fresh random key in pass-through form.
pub fn keygen() {
    let key = StoreKey::generate();
    println!("{}", key.encode().as_str());
}

/// Add or update a product.
pub async fn add_product(
    config: &StoreConfig,
    name: &str,
    price: &str,
    family: &str,
    actor: &str,
) -> Result<()> {
    let price: Money = price.parse().context("Invalid price")?;
    let product = NewProduct::new(name, price, parse_family(family)?);
    let actor = actor.to_string();

    let store = open_store(config)?;
    let id = store
        .run(move |s| s.products().save(&product, &actor))
        .await?;

    println!("Saved product #{}: {} at {}", id, name, price);
    Ok(())
}

/// List products.
pub async fn list_products(config: &StoreConfig, family: Option<&str>, all: bool) -> Result<()> {
    let filter = ProductFilter {
        family: family.map(parse_family).transpose()?,
        include_inactive: all,
    };

    let store = open_store(config)?;
    let products = store.run(move |s| s.products().get_all(&filter)).await?;

    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }
    for product in products {
        println!(
            "{:<30} {:>10}  {:<6}{}",
            product.name,
            product.price,
            product.family,
            if product.state.is_active() { "" } else { "  (inactive)" },
        );
    }
    Ok(())
}

/// Deactivate a product.
pub async fn delete_product(config: &StoreConfig, name: &str, actor: &str) -> Result<()> {
    let (owned, actor) = (name.to_string(), actor.to_string());
    let store = open_store(config)?;
    let removed = store.run(move |s| s.products().delete(&owned, &actor)).await?;

    if removed {
        println!("Product deactivated: {}", name);
    } else {
        println!("No active product named {}", name);
    }
    Ok(())
}

/// Show price changes for a product.
pub async fn price_history(config: &StoreConfig, name: &str) -> Result<()> {
    let owned = name.to_string();
    let store = open_store(config)?;
    let history = store.run(move |s| s.products().price_history(&owned)).await?;

    if history.is_empty() {
        println!("No price changes for {}", name);
    }
    for entry in history {
        println!(
            "{}  {:>10} -> {:<10}  by {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.old_price,
            entry.new_price,
            entry.actor.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Add or update a customer.
pub async fn add_customer(config: &StoreConfig, customer: NewCustomer, actor: &str) -> Result<()> {
    let name = customer.name.clone();
    let actor = actor.to_string();
    let store = open_store(config)?;
    let id = store.run(move |s| s.customers().save(&customer, &actor)).await?;

    println!("Saved customer #{}: {}", id, name);
    Ok(())
}

/// List customers.
pub async fn list_customers(config: &StoreConfig, all: bool) -> Result<()> {
    let store = open_store(config)?;
    let customers = store.run(move |s| s.customers().get_all(all)).await?;

    if customers.is_empty() {
        println!("No customers.");
    }
    for customer in customers {
        println!(
            "{:<30} {:<15} {:<30}{}",
            customer.name,
            customer.phone.as_deref().unwrap_or("-"),
            customer.email.as_deref().unwrap_or("-"),
            if customer.state.is_active() { "" } else { "  (inactive)" },
        );
    }
    Ok(())
}

/// Deactivate a customer.
pub async fn delete_customer(config: &StoreConfig, name: &str, actor: &str) -> Result<()> {
    let (owned, actor) = (name.to_string(), actor.to_string());
    let store = open_store(config)?;
    let removed = store.run(move |s| s.customers().delete(&owned, &actor)).await?;

    if removed {
        println!("Customer deactivated: {}", name);
    } else {
        println!("No active customer named {}", name);
    }
    Ok(())
}

/// Add or update a waiter.
pub async fn add_waiter(config: &StoreConfig, waiter: NewWaiter, actor: &str) -> Result<()> {
    let name = waiter.name.clone();
    let actor = actor.to_string();
    let store = open_store(config)?;
    let id = store.run(move |s| s.waiters().save(&waiter, &actor)).await?;

    println!("Saved waiter #{}: {}", id, name);
    Ok(())
}

/// List waiters.
pub async fn list_waiters(config: &StoreConfig, all: bool) -> Result<()> {
    let store = open_store(config)?;
    let waiters = store.run(move |s| s.waiters().get_all(all)).await?;

    if waiters.is_empty() {
        println!("No waiters.");
    }
    for waiter in waiters {
        println!(
            "{:<30} {:<10}{}",
            waiter.name,
            waiter.code.as_deref().unwrap_or("-"),
            if waiter.state.is_active() { "" } else { "  (inactive)" },
        );
    }
    Ok(())
}

/// Deactivate a waiter.
pub async fn delete_waiter(config: &StoreConfig, name: &str, actor: &str) -> Result<()> {
    let (owned, actor) = (name.to_string(), actor.to_string());
    let store = open_store(config)?;
    let removed = store.run(move |s| s.waiters().delete(&owned, &actor)).await?;

    if removed {
        println!("Waiter deactivated: {}", name);
    } else {
        println!("No active waiter named {}", name);
    }
    Ok(())
}

/// Ring up a pending receipt priced from the catalogue.
pub async fn add_receipt(
    config: &StoreConfig,
    waiter: String,
    customer: Option<String>,
    lines: &[String],
    actor: &str,
) -> Result<()> {
    let specs = lines
        .iter()
        .map(|spec| parse_line_spec(spec))
        .collect::<Result<Vec<_>>>()?;
    let actor = actor.to_string();

    let store = open_store(config)?;
    let receipt = store
        .run(move |s| {
            let products = s.products();
            let mut lines = Vec::with_capacity(specs.len());
            for (name, quantity) in specs {
                let product = products
                    .find(&name)?
                    .ok_or_else(|| Error::NotFound(format!("product {}", name)))?;
                lines.push(NewReceiptLine::new(product.name, quantity, product.price, product.family));
            }

            let tax_rate = s.configuration().tax_rate()?;
            let mut receipt = Receipt::new(waiter, customer, tax_rate, lines)?;
            receipt.id = Some(s.receipts().save(&receipt, &actor)?);
            Ok(receipt)
        })
        .await?;

    print_receipt(&receipt);
    for line in &receipt.lines {
        println!(
            "    {:>3} x {:<26} {:>8} {:>10}",
            line.quantity, line.product_name, line.unit_price, line.line_subtotal
        );
    }
    println!("    subtotal {}  tax {}  total {}", receipt.subtotal, receipt.tax_rate, receipt.total);
    Ok(())
}

/// List receipts, newest first.
pub async fn list_receipts(
    config: &StoreConfig,
    status: Option<&str>,
    customer: Option<String>,
    waiter: Option<String>,
    limit: u32,
) -> Result<()> {
    let status: Option<ReceiptStatus> = status
        .map(str::parse)
        .transpose()
        .context("Status must be pending, paid_cash or paid_card")?;
    let filter = ReceiptFilter {
        status,
        customer_name: customer,
        waiter_name: waiter,
        limit: Some(limit),
        ..Default::default()
    };

    let store = open_store(config)?;
    let receipts = store.run(move |s| s.receipts().get_all(&filter)).await?;

    if receipts.is_empty() {
        println!("No receipts.");
    }
    for receipt in &receipts {
        print_receipt(receipt);
    }
    Ok(())
}

/// Show one receipt as JSON.
pub async fn show_receipt(config: &StoreConfig, id: i64) -> Result<()> {
    let store = open_store(config)?;
    let receipt = store
        .run(move |s| s.receipts().get(id))
        .await?
        .with_context(|| format!("No receipt #{}", id))?;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

/// Settle a pending receipt.
pub async fn pay_receipt(config: &StoreConfig, id: i64, card: bool, actor: &str) -> Result<()> {
    let status = if card { ReceiptStatus::PaidCard } else { ReceiptStatus::PaidCash };
    let actor = actor.to_string();
    let store = open_store(config)?;
    store
        .run(move |s| s.receipts().update_status(id, status, &actor))
        .await?;

    println!("Receipt #{} is now {}", id, status);
    Ok(())
}

/// Mark a receipt as printed.
pub async fn mark_printed(config: &StoreConfig, id: i64, actor: &str) -> Result<()> {
    let actor = actor.to_string();
    let store = open_store(config)?;
    store.run(move |s| s.receipts().mark_printed(id, &actor)).await?;

    println!("Receipt #{} marked printed", id);
    Ok(())
}

/// Delete a receipt.
pub async fn delete_receipt(config: &StoreConfig, id: i64, actor: &str) -> Result<()> {
    let actor = actor.to_string();
    let store = open_store(config)?;
    let removed = store.run(move |s| s.receipts().delete(id, &actor)).await?;

    if removed {
        println!("Receipt #{} deleted", id);
    } else {
        println!("No receipt #{}", id);
    }
    Ok(())
}

/// Show configuration entries, hiding sensitive values.
pub async fn config_get(config: &StoreConfig, key: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.run(|s| s.configuration().entries()).await?;

    let mut shown = 0;
    for entry in entries.iter().filter(|e| key.map_or(true, |k| e.key == k)) {
        println!("{} = {}", entry.key, sanitize_for_log(&entry.key, &entry.value.to_string()));
        shown += 1;
    }
    if shown == 0 {
        match key {
            Some(key) => println!("{} is not set", key),
            None => println!("No configuration set."),
        }
    }
    Ok(())
}

/// Set a configuration value.
pub async fn config_set(config: &StoreConfig, key: &str, value: &str) -> Result<()> {
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    let owned = key.to_string();
    let store = open_store(config)?;
    store.run(move |s| s.configuration().set(&owned, &value)).await?;

    println!("Set {}", key);
    Ok(())
}

/// Set the tax rate applied to new receipts.
pub async fn set_tax_rate(config: &StoreConfig, percent: &str) -> Result<()> {
    let rate: TaxRate = percent.parse().context("Invalid tax rate")?;
    let store = open_store(config)?;
    store.run(move |s| s.configuration().set_tax_rate(rate)).await?;

    println!("Tax rate set to {}", rate);
    Ok(())
}

/// Set the operator password.
pub async fn set_password(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;

    let password = Zeroizing::new(get_password("New password: ")?);
    let confirm = Zeroizing::new(get_password("Confirm password: ")?);
    if password.as_str() != confirm.as_str() {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    store
        .run(move |s| s.configuration().set_password(&password))
        .await?;
    println!("Password updated.");
    Ok(())
}

/// Show the audit trail.
pub async fn show_audit(
    config: &StoreConfig,
    table: Option<String>,
    record: Option<i64>,
    limit: u32,
) -> Result<()> {
    let filter = AuditFilter {
        table,
        record_id: record,
        limit: Some(limit),
    };
    let store = open_store(config)?;
    let entries: Vec<AuditEntry> = store.run(move |s| s.audit().entries(&filter)).await?;

    if entries.is_empty() {
        println!("No audit entries.");
    }
    for entry in entries {
        println!(
            "{:>6}  {}  {:<7} {}#{:<6} by {}",
            entry.id,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.table_name,
            entry.record_id,
            entry.actor,
        );
    }
    Ok(())
}

/// Interval between backups for `--every <minutes>`.
fn backup_period(minutes: u64) -> Result<Duration> {
    if minutes == 0 {
        bail!("--every must be at least 1 minute");
    }
    let Some(seconds) = minutes.checked_mul(60) else {
        bail!("--every {} minutes is too long", minutes);
    };
    Ok(Duration::from_secs(seconds))
}

/// Back up once, or on an interval until interrupted.
pub async fn backup(config: &StoreConfig, every: Option<u64>) -> Result<()> {
    let store = open_store(config)?;

    let Some(minutes) = every else {
        let path = store.create_backup().context("Backup failed")?;
        println!("Backup written: {}", path.display());
        return Ok(());
    };
    let period = backup_period(minutes)?;

    println!(
        "Backing up every {} minute(s) to {}. Press Ctrl+C to stop.",
        minutes,
        store.backups().backup_dir().display()
    );

    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // A failed backup is logged and retried on the next tick.
                match store.create_backup() {
                    Ok(path) => tracing::info!(path = %path.display(), "backup written"),
                    Err(e) => tracing::error!(error = %e, "backup failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping backups.");
                break;
            }
        }
    }
    Ok(())
}

/// List backups, oldest first.
pub async fn list_backups(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    let backups = store.list_backups()?;

    if backups.is_empty() {
        println!("No backups in {}", store.backups().backup_dir().display());
    }
    for path in backups {
        println!("{}", path.display());
    }
    Ok(())
}

/// Show counts and totals.
pub async fn stats(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    println!("Store: {}", store.path().display());
    if let Some(bytes) = stats.store_bytes {
        println!("  Size:          {} bytes", bytes);
    }
    println!("  Products:      {}", stats.products);
    println!("  Customers:     {}", stats.customers);
    println!("  Waiters:       {}", stats.waiters);
    println!("  Audit entries: {}", stats.audit_entries);
    println!("  Receipts:      {}", stats.receipt_count());
    for totals in &stats.receipts {
        println!("    {:<10} {:>6} {:>12}", totals.status, totals.count, totals.total);
    }
    match stats.paid_total() {
        Some(total) => println!("  Paid total:    {}", total),
        None => println!("  Paid total:    out of range"),
    }
    Ok(())
}

/// Check the store decrypts and passes the integrity check.
pub async fn verify(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    store.verify().context("Store failed verification")?;
    println!("Store OK: {}", store.path().display());
    Ok(())
}

/// Import legacy JSON documents in one session.
pub async fn import_legacy(
    config: &StoreConfig,
    general: Option<PathBuf>,
    years: Vec<PathBuf>,
) -> Result<()> {
    if general.is_none() && years.is_empty() {
        bail!("Nothing to import: pass --general and/or year files");
    }

    let store = open_store(config)?;
    let report = store
        .import_legacy(general.as_deref(), &years)
        .context("Import failed; nothing was written")?;

    println!("Imported:");
    println!("  Products:  {}", report.products);
    println!("  Customers: {}", report.customers);
    println!("  Waiters:   {}", report.waiters);
    println!("  Receipts:  {}", report.receipts);
    if report.skipped_lines > 0 {
        println!("  Skipped {} line(s) with a non-positive quantity", report.skipped_lines);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_spec() {
        assert_eq!(parse_line_spec("Coffee").unwrap(), ("Coffee".to_string(), 1));
        assert_eq!(parse_line_spec("Coffee:3").unwrap(), ("Coffee".to_string(), 3));
        assert!(parse_line_spec("Coffee:x").is_err());
        assert!(parse_line_spec("Coffee:-1").is_err());
    }

    #[test]
    fn test_backup_period() {
        assert_eq!(backup_period(15).unwrap(), Duration::from_secs(900));
        assert!(backup_period(0).is_err());
        assert!(backup_period(u64::MAX).is_err());
    }

    #[test]
    fn test_store_config_paths() {
        let config = store_config("/srv/tpv", Some("/mnt/usb"), 7);
        assert_eq!(config.store_path(), PathBuf::from("/srv/tpv/tpv.db"));
        assert_eq!(config.backup_path(), PathBuf::from("/mnt/usb"));
        assert_eq!(config.backup_retention, 7);
    }
}
