//! Database initialization, status and the per-command service context

use anyhow::{Context, Result};
use expensebook_business::{
    IdentityResolver, LedgerConfig, LocalProofStore, ServiceContext, TenantContext,
};
use expensebook_core::Principal;
use expensebook_persistence::Database;
use std::path::Path;
use std::sync::Arc;

use crate::Cli;

fn db_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }

    let db = Database::open(&db_url(db_path))
        .await
        .context("Failed to create database")?;
    db.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path, json: bool) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'expensebook init' to create the database");
        return Ok(());
    }

    let db = Database::open(&db_url(db_path))
        .await
        .context("Failed to open database")?;
    let stats = db.stats().await?;
    db.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();
    println!("   Organizations: {}", stats.organizations);
    println!("   Users:         {}", stats.users);
    println!("   Expenses:      {}", stats.expenses);
    println!("   Payments:      {}", stats.payments);
    Ok(())
}

/// Everything a command needs: services, the caller and the output mode
pub struct App {
    pub ctx: ServiceContext,
    pub json: bool,
    principal: Option<Principal>,
}

impl App {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => LedgerConfig::load_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => LedgerConfig::default(),
        }
        .with_env_overrides()
        .context("Invalid EXPENSEBOOK_* override")?;

        tracing::debug!(db = ?cli.db, proofs = ?cli.proofs_dir, "opening ledger");
        let db = Database::open(&db_url(&cli.db))
            .await
            .context("Failed to open database")?;
        let proofs = Arc::new(LocalProofStore::new(&cli.proofs_dir));

        Ok(Self {
            ctx: ServiceContext::new(&db, config, proofs),
            json: cli.json,
            principal: cli.principal(),
        })
    }

    /// Resolve the caller; fails without `--as-id` and `--as-email`
    pub async fn tenant(&self) -> Result<TenantContext> {
        let tenant = IdentityResolver::new(&self.ctx)
            .resolve(self.principal.as_ref())
            .await
            .context("Pass --as-id and --as-email to act as a signed-in user")?;
        Ok(tenant)
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
