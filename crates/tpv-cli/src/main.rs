//! TPV CLI
//!
//! Command-line front end for the encrypted point-of-sale store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// TPV - encrypted point-of-sale store
#[derive(Parser)]
#[command(name = "tpv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Data directory
    #[arg(short, long, env = "TPV_DATA_DIR", default_value = "~/.tpv")]
    data_dir: String,

    /// Backup directory (defaults to <data-dir>/backup)
    #[arg(long, env = "TPV_BACKUP_DIR")]
    backup_dir: Option<String>,

    /// Backups kept after each new one
    #[arg(long, env = "TPV_BACKUP_RETENTION", default_value_t = tpv_core::storage::DEFAULT_RETENTION)]
    retention: usize,

    /// Name recorded in the audit trail for changes made by this command
    #[arg(short, long, env = "TPV_ACTOR", default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store (or check an existing one opens)
    Init,

    /// Print a fresh random secret usable as TPV_SECRET
    Keygen,

    /// Manage the product catalogue
    #[command(subcommand)]
    Product(ProductCommand),

    /// Manage customers
    #[command(subcommand)]
    Customer(CustomerCommand),

    /// Manage waiters
    #[command(subcommand)]
    Waiter(WaiterCommand),

    /// Record and settle receipts
    #[command(subcommand)]
    Receipt(ReceiptCommand),

    /// Read and change configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show the audit trail, newest first
    Audit {
        /// Only this table (products, customers, waiters, receipts)
        #[arg(short, long)]
        table: Option<String>,

        /// Only this record id
        #[arg(short, long)]
        record: Option<i64>,

        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Create a backup now, or every N minutes
    Backup {
        /// Keep running and back up on this interval (minutes)
        #[arg(long)]
        every: Option<u64>,
    },

    /// List existing backups, oldest first
    Backups,

    /// Show counts and totals
    Stats,

    /// Check the store decrypts and is internally consistent
    Verify,

    /// Import legacy JSON files
    ImportLegacy {
        /// The general document (products, customers, waiters, settings)
        #[arg(short, long)]
        general: Option<PathBuf>,

        /// Year documents with receipts
        years: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Add a product or change its price/family
    Add {
        /// Product name
        name: String,
        /// Price, e.g. 1.20
        price: String,
        /// drink, food, other or misc
        #[arg(short, long, default_value = "other")]
        family: String,
    },
    /// List products
    List {
        /// Only this family
        #[arg(short, long)]
        family: Option<String>,
        /// Include deactivated products
        #[arg(long)]
        all: bool,
    },
    /// Deactivate a product
    Delete {
        /// Product name
        name: String,
    },
    /// Show the price history of a product
    History {
        /// Product name
        name: String,
    },
}

#[derive(Subcommand)]
enum CustomerCommand {
    /// Add or update a customer
    Add {
        /// Customer name
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List customers
    List {
        /// Include deactivated customers
        #[arg(long)]
        all: bool,
    },
    /// Deactivate a customer
    Delete {
        /// Customer name
        name: String,
    },
}

#[derive(Subcommand)]
enum WaiterCommand {
    /// Add or update a waiter
    Add {
        /// Waiter name
        name: String,
        /// Short login code
        #[arg(long)]
        code: Option<String>,
    },
    /// List waiters
    List {
        /// Include deactivated waiters
        #[arg(long)]
        all: bool,
    },
    /// Deactivate a waiter
    Delete {
        /// Waiter name
        name: String,
    },
}

#[derive(Subcommand)]
enum ReceiptCommand {
    /// Ring up a pending receipt from catalogue products
    Add {
        /// Waiter serving
        #[arg(short, long)]
        waiter: String,
        /// Customer, omit for an anonymous sale
        #[arg(short, long)]
        customer: Option<String>,
        /// Lines as NAME or NAME:QUANTITY
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// List receipts, newest first
    List {
        /// pending, paid_cash or paid_card
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        customer: Option<String>,
        #[arg(short, long)]
        waiter: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show one receipt with its lines
    Show {
        id: i64,
    },
    /// Settle a pending receipt
    Pay {
        id: i64,
        /// Paid by card instead of cash
        #[arg(long)]
        card: bool,
    },
    /// Mark a receipt as printed
    Printed {
        id: i64,
    },
    /// Delete a receipt
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show all entries, or one key
    Get {
        key: Option<String>,
    },
    /// Set a key to a JSON value (bare text is stored as a string)
    Set {
        key: String,
        value: String,
    },
    /// Set the tax rate as a percentage, e.g. 21 or 10.5
    TaxRate {
        percent: String,
    },
    /// Set the operator password (prompted)
    Password,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = commands::store_config(&cli.data_dir, cli.backup_dir.as_deref(), cli.retention);
    let actor = cli.actor.as_str();

    match cli.command {
        None | Some(Commands::Init) => {
            commands::init(&config).await?;
        }
        Some(Commands::Keygen) => {
            commands::keygen();
        }
        Some(Commands::Product(cmd)) => match cmd {
            ProductCommand::Add { name, price, family } => {
                commands::add_product(&config, &name, &price, &family, actor).await?;
            }
            ProductCommand::List { family, all } => {
                commands::list_products(&config, family.as_deref(), all).await?;
            }
            ProductCommand::Delete { name } => {
                commands::delete_product(&config, &name, actor).await?;
            }
            ProductCommand::History { name } => {
                commands::price_history(&config, &name).await?;
            }
        },
        Some(Commands::Customer(cmd)) => match cmd {
            CustomerCommand::Add { name, phone, email, notes } => {
                let customer = tpv_core::NewCustomer { name, phone, email, notes };
                commands::add_customer(&config, customer, actor).await?;
            }
            CustomerCommand::List { all } => {
                commands::list_customers(&config, all).await?;
            }
            CustomerCommand::Delete { name } => {
                commands::delete_customer(&config, &name, actor).await?;
            }
        },
        Some(Commands::Waiter(cmd)) => match cmd {
            WaiterCommand::Add { name, code } => {
                commands::add_waiter(&config, tpv_core::NewWaiter { name, code }, actor).await?;
            }
            WaiterCommand::List { all } => {
                commands::list_waiters(&config, all).await?;
            }
            WaiterCommand::Delete { name } => {
                commands::delete_waiter(&config, &name, actor).await?;
            }
        },
        Some(Commands::Receipt(cmd)) => match cmd {
            ReceiptCommand::Add { waiter, customer, lines } => {
                commands::add_receipt(&config, waiter, customer, &lines, actor).await?;
            }
            ReceiptCommand::List { status, customer, waiter, limit } => {
                commands::list_receipts(&config, status.as_deref(), customer, waiter, limit).await?;
            }
            ReceiptCommand::Show { id } => {
                commands::show_receipt(&config, id).await?;
            }
            ReceiptCommand::Pay { id, card } => {
                commands::pay_receipt(&config, id, card, actor).await?;
            }
            ReceiptCommand::Printed { id } => {
                commands::mark_printed(&config, id, actor).await?;
            }
            ReceiptCommand::Delete { id } => {
                commands::delete_receipt(&config, id, actor).await?;
            }
        },
        Some(Commands::Config(cmd)) => match cmd {
            ConfigCommand::Get { key } => {
                commands::config_get(&config, key.as_deref()).await?;
            }
            ConfigCommand::Set { key, value } => {
                commands::config_set(&config, &key, &value).await?;
            }
            ConfigCommand::TaxRate { percent } => {
                commands::set_tax_rate(&config, &percent).await?;
            }
            ConfigCommand::Password => {
                commands::set_password(&config).await?;
            }
        },
        Some(Commands::Audit { table, record, limit }) => {
            commands::show_audit(&config, table, record, limit).await?;
        }
        Some(Commands::Backup { every }) => {
            commands::backup(&config, every).await?;
        }
        Some(Commands::Backups) => {
            commands::list_backups(&config).await?;
        }
        Some(Commands::Stats) => {
            commands::stats(&config).await?;
        }
        Some(Commands::Verify) => {
            commands::verify(&config).await?;
        }
        Some(Commands::ImportLegacy { general, years }) => {
            commands::import_legacy(&config, general, years).await?;
        }
    }

    Ok(())
}
