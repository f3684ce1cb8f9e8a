//! # Expensebook Persistence
//!
//! SQLite storage for the expense ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Database                    │
//! │  ┌─────────────┐          ┌───────────────┐  │
//! │  │ SqlitePool  │ ◀─────── │     Repos     │  │
//! │  │  (WAL)      │          │ (1 statement) │  │
//! │  └─────────────┘          └───────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Repos are stateless and take any executor, so the business layer decides
//! which statements share a transaction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use expensebook_persistence::{Database, ExpenseRepo};
//!
//! let db = Database::open("sqlite:expensebook.db").await?;
//! let rows = ExpenseRepo::list_by_org(db.pool(), &org_id, 20).await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{ExpenseRow, OrganizationRow, PaymentRow, UserRow};
pub use sqlite::{
    init_database, ExpenseRepo, OrganizationRepo, PaymentRepo, SequenceRepo, UserRepo,
};

use serde::Serialize;
use sqlx::SqlitePool;

/// Default pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub organizations: i64,
    pub users: i64,
    pub expenses: i64,
    pub payments: i64,
}

/// Database facade
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and ensure the schema
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:expensebook.db")
    pub async fn open(db_url: &str) -> PersistenceResult<Self> {
        Self::open_with(db_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Same as [`Database::open`] with an explicit pool size
    pub async fn open_with(db_url: &str, max_connections: u32) -> PersistenceResult<Self> {
        let pool = init_database(db_url, max_connections).await?;
        tracing::info!(db_url, max_connections, "database opened");
        Ok(Self { pool })
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Count rows in every table
    pub async fn stats(&self) -> PersistenceResult<DatabaseStats> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM organizations),
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM expenses),
                (SELECT COUNT(*) FROM expense_payments)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            organizations: row.0,
            users: row.1,
            expenses: row.2,
            payments: row.3,
        })
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
