//! Shared setup for the business integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use tempfile::TempDir;

use expensebook_business::{
    IdentityResolver, LedgerConfig, LocalProofStore, NewExpense, ProofStore, ServiceContext,
    TenantContext,
};
use expensebook_core::Principal;
use expensebook_persistence::Database;

/// A fresh database in a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub db: Database,
    pub ctx: ServiceContext,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    pub async fn with_config(config: LedgerConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalProofStore::new(dir.path().join("proofs")));
        Self::build(dir, config, store).await
    }

    pub async fn with_store(config: LedgerConfig, store: Arc<dyn ProofStore>) -> Self {
        let dir = TempDir::new().unwrap();
        Self::build(dir, config, store).await
    }

    async fn build(dir: TempDir, config: LedgerConfig, store: Arc<dyn ProofStore>) -> Self {
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
        let db = Database::open(&url).await.unwrap();
        let ctx = ServiceContext::new(&db, config, store);
        Self { dir, db, ctx }
    }

    /// Resolve a principal, bootstrapping its organization if needed
    pub async fn sign_in(&self, external_id: &str, email: &str) -> TenantContext {
        IdentityResolver::new(&self.ctx)
            .resolve(Some(&Principal::new(external_id, email)))
            .await
            .unwrap()
    }

    /// Take the database write lock on a separate connection
    pub async fn hold_write_lock(&self) -> PoolConnection<Sqlite> {
        let mut conn = self.db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.unwrap();
        conn
    }

    /// Files written by the local proof store
    pub fn stored_proofs(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("proofs"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Give back a lock taken with [`Harness::hold_write_lock`]
pub async fn release_write_lock(mut conn: PoolConnection<Sqlite>) {
    sqlx::query("ROLLBACK").execute(&mut *conn).await.unwrap();
}

/// Expense draft with both proofs attached
pub fn draft(total: Decimal, paid_now: Decimal) -> NewExpense {
    NewExpense::new(total, paid_now)
        .invoice_proof("file:///proofs/bill.png")
        .payment_proof("file:///proofs/paid.png")
}
