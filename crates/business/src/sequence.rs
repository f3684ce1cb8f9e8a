//! Per-organization document numbering
//!
//! Numbers come from one atomic `UPDATE ... RETURNING` on the organization's
//! counter, so two reservations can never observe the same value. Numbers
//! abandoned by failed writes leave gaps; they are never handed out again.

use crate::error::{LedgerError, LedgerResult};
use crate::services::{backoff, ServiceContext, TenantContext};
use expensebook_core::DocumentNumber;
use expensebook_persistence::SequenceRepo;
use tracing::{debug, warn};

/// Sequence Generator
pub struct SequenceGenerator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SequenceGenerator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Reserve the next formatted document number, e.g. `EX-1001`
    pub async fn next_number(&self, tenant: &TenantContext) -> LedgerResult<DocumentNumber> {
        let n = self.reserve(tenant).await?;
        Ok(DocumentNumber::new(&self.ctx.config().document_prefix, n))
    }

    /// Reserve the next raw counter value.
    ///
    /// Lost races are retried with a fresh reservation up to
    /// `sequence_max_attempts`, then reported as a persistence failure.
    pub async fn reserve(&self, tenant: &TenantContext) -> LedgerResult<i64> {
        let org_id = tenant.organization_id();
        let max_attempts = self.ctx.config().sequence_max_attempts;

        for attempt in 1..=max_attempts {
            match self.try_reserve(org_id).await {
                Ok(n) => {
                    debug!(org_id, number = n, attempt, "sequence number reserved");
                    return Ok(n);
                }
                Err(LedgerError::SequenceConflict(reason)) => {
                    warn!(org_id, attempt, %reason, "sequence conflict, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::Contention {
            operation: "sequence reservation",
            attempts: max_attempts,
        })
    }

    async fn try_reserve(&self, org_id: &str) -> LedgerResult<i64> {
        let pool = self.ctx.pool();
        match SequenceRepo::increment(pool, org_id).await {
            Ok(Some(n)) => Ok(n),
            Ok(None) => {
                // organizations bootstrapped before counters existed
                SequenceRepo::create(pool, org_id, self.ctx.config().sequence_floor)
                    .await
                    .map_err(conflict_or_fail)?;
                Err(LedgerError::SequenceConflict(format!(
                    "counter for {} was missing",
                    org_id
                )))
            }
            Err(e) => Err(conflict_or_fail(e)),
        }
    }
}

fn conflict_or_fail(err: expensebook_persistence::PersistenceError) -> LedgerError {
    if err.is_busy() {
        LedgerError::SequenceConflict(err.to_string())
    } else {
        err.into()
    }
}
