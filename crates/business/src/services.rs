//! Service context and shared result types
//!
//! Every service borrows a [`ServiceContext`]; every tenant-scoped operation
//! additionally takes a [`TenantContext`], which only the identity resolver
//! can produce.

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::proof::ProofStore;
use expensebook_core::{Expense, Payment, Role};
use expensebook_persistence::Database;
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Context for business operations - database, configuration and proof store
#[derive(Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    config: Arc<LedgerConfig>,
    proofs: Arc<dyn ProofStore>,
}

impl ServiceContext {
    /// Create new service context from database
    pub fn new(db: &Database, config: LedgerConfig, proofs: Arc<dyn ProofStore>) -> Self {
        Self::from_parts(db.pool().clone(), config, proofs)
    }

    /// Create from pool directly
    pub fn from_parts(pool: SqlitePool, config: LedgerConfig, proofs: Arc<dyn ProofStore>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            proofs,
        }
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn proofs(&self) -> &dyn ProofStore {
        self.proofs.as_ref()
    }

    /// Bound a write unit of work by the configured write timeout.
    ///
    /// On timeout the future is dropped, which rolls back any open sqlx
    /// transaction it owned.
    pub async fn with_write_timeout<T, F>(&self, operation: &'static str, work: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        match tokio::time::timeout(self.config.write_timeout(), work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.config.write_timeout_ms,
                    "write timed out, rolled back"
                );
                Err(LedgerError::WriteTimeout {
                    operation,
                    timeout_ms: self.config.write_timeout_ms,
                })
            }
        }
    }
}

/// Pause between retries of a contended unit of work
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(5 * u64::from(attempt.min(20)))
}

/// Resolved actor of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    organization_id: String,
    user_id: String,
    role: Role,
}

impl TenantContext {
    pub(crate) fn new(organization_id: &str, user_id: &str, role: Role) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            role,
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Result of recording an expense
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseReceipt {
    pub expense: Expense,
    /// Payment recorded together with the expense, when paid at creation
    pub first_payment: Option<Payment>,
}

impl ExpenseReceipt {
    pub fn document_number(&self) -> &str {
        self.expense.expense_no.as_str()
    }
}

/// Result of recording a payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    /// Expense state after the payment
    pub expense: Expense,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_context_accessors() {
        let ctx = TenantContext::new("org-1", "user-1", Role::Admin);
        assert_eq!(ctx.organization_id(), "org-1");
        assert_eq!(ctx.user_id(), "user-1");
        assert!(ctx.is_admin());
    }

    #[test]
    fn test_backoff_is_bounded() {
        assert_eq!(backoff(1), Duration::from_millis(5));
        assert_eq!(backoff(1000), Duration::from_millis(100));
    }
}
