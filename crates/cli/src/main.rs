//! Expensebook CLI - record expenses and reconcile payments
//!
//! Usage:
//! ```bash
//! expensebook init
//! expensebook --as-id auth-1 --as-email alice@example.com whoami
//! expensebook --as-id auth-1 --as-email alice@example.com expense create 1000 --paid 400 \
//!     --invoice bill.jpg --payment-proof paid.jpg --recorded-by "Site Supervisor"
//! expensebook --as-id auth-1 --as-email alice@example.com payment add EX-1001 600 --mode upi
//! expensebook --as-id auth-1 --as-email alice@example.com --json expense history EX-1001
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use expensebook_core::money::parse_amount;
use expensebook_core::{PaymentMode, Principal};
use rust_decimal::Decimal;
use std::path::PathBuf;

mod commands;
mod db;

use commands::{expense, identity, payment};

/// Expensebook - multi-tenant expense ledger with payment reconciliation
#[derive(Parser)]
#[command(name = "expensebook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/expensebook.db", global = true)]
    pub db: PathBuf,

    /// Directory for uploaded proof files
    #[arg(long, default_value = "data/proofs", global = true)]
    pub proofs_dir: PathBuf,

    /// Ledger configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// External identity of the caller
    #[arg(long, global = true)]
    pub as_id: Option<String>,

    /// Email of the caller
    #[arg(long, global = true)]
    pub as_email: Option<String>,

    /// Display name of the caller
    #[arg(long, global = true)]
    pub as_name: Option<String>,

    /// Organization name used if this sign-in creates one
    #[arg(long, global = true)]
    pub org_name: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Principal built from the `--as-*` flags, if both id and email are given
    pub fn principal(&self) -> Option<Principal> {
        let (id, email) = (self.as_id.as_deref()?, self.as_email.as_deref()?);
        let mut principal = Principal::new(id, email);
        if let Some(name) = &self.as_name {
            principal = principal.with_name(name);
        }
        if let Some(org) = &self.org_name {
            principal = principal.with_organization_name(org);
        }
        Some(principal)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database with schema
    Init {
        /// Force re-initialization (drops existing data)
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,

    /// Resolve the caller's organization, creating it on first sign-in
    Whoami,

    /// Check whether an email may sign up
    SignupCheck {
        /// Email address
        email: String,
    },

    /// Invite a member into the caller's organization (admins only)
    Invite {
        /// Email address
        email: String,
    },

    /// List active members of the caller's organization
    Members,

    /// Expense management
    Expense {
        #[command(subcommand)]
        action: ExpenseAction,
    },

    /// Payment reconciliation
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
pub enum ExpenseAction {
    /// Record a new expense
    Create {
        /// Total amount
        #[arg(value_parser = parse_amount)]
        total: Decimal,
        /// Amount paid now
        #[arg(long, default_value = "0", value_parser = parse_amount)]
        paid: Decimal,
        /// Invoice proof file (image or PDF)
        #[arg(long)]
        invoice: PathBuf,
        /// Payment proof file, required when --paid is nonzero
        #[arg(long)]
        payment_proof: Option<PathBuf>,
        /// Mode of the first payment
        #[arg(long, default_value = "cash")]
        mode: PaymentModeArg,
        /// User id or name of whoever recorded the payment
        #[arg(long)]
        recorded_by: Option<String>,
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        vendor: Option<String>,
        /// Expense date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show an expense
    Show {
        /// Document number (e.g., EX-1001)
        number: String,
    },
    /// List recent expenses
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show payments of an expense
    History {
        /// Document number
        number: String,
    },
}

#[derive(Subcommand)]
pub enum PaymentAction {
    /// Record a payment against an expense
    Add {
        /// Document number
        number: String,
        /// Amount
        #[arg(value_parser = parse_amount)]
        amount: Decimal,
        #[arg(long, default_value = "cash")]
        mode: PaymentModeArg,
        /// Payment proof file (image or PDF)
        #[arg(long)]
        proof: Option<PathBuf>,
        /// User id or name of whoever recorded the payment
        #[arg(long)]
        recorded_by: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PaymentModeArg {
    Cash,
    Upi,
    Bank,
}

impl PaymentModeArg {
    pub fn to_core_mode(&self) -> PaymentMode {
        match self {
            PaymentModeArg::Cash => PaymentMode::Cash,
            PaymentModeArg::Upi => PaymentMode::Upi,
            PaymentModeArg::Bank => PaymentMode::Bank,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Ensure data directories exist
    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    match &cli.command {
        Commands::Init { force } => {
            db::init_database(&cli.db, *force).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db, cli.json).await?;
        }

        Commands::Whoami => {
            let app = db::App::open(&cli).await?;
            identity::whoami(&app).await?;
        }

        Commands::SignupCheck { email } => {
            let app = db::App::open(&cli).await?;
            identity::signup_check(&app, email).await?;
        }

        Commands::Invite { email } => {
            let app = db::App::open(&cli).await?;
            identity::invite(&app, email).await?;
        }

        Commands::Members => {
            let app = db::App::open(&cli).await?;
            identity::members(&app).await?;
        }

        Commands::Expense { action } => {
            let app = db::App::open(&cli).await?;
            expense::handle(&app, action).await?;
        }

        Commands::Payment { action } => {
            let app = db::App::open(&cli).await?;
            payment::handle(&app, action).await?;
        }
    }

    Ok(())
}
