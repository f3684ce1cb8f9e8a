//! Payment reconciliation
//!
//! A payment is validated against the balance read inside its own
//! transaction. The aggregate update is a compare-and-swap on that read, so
//! when another payment commits first the attempt rolls back and the whole
//! call runs again on fresh data. Concurrent payments can therefore never
//! jointly overdraw an expense.
//!
//! Not idempotent: two identical calls record two payments.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{check_scale, ExpenseLedger};
use crate::proof::{ProofGateway, ProofUpload};
use crate::services::{backoff, PaymentReceipt, ServiceContext, TenantContext};
use expensebook_core::{Expense, Payment, PaymentMode, RecordedBy};
use expensebook_persistence::{ExpenseRepo, PaymentRepo};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Input for a new payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub mode: PaymentMode,
    pub proof_url: Option<String>,
    /// A user id, or any free-text name
    pub recorded_by: Option<String>,
}

impl NewPayment {
    pub fn new(amount: Decimal, mode: PaymentMode) -> Self {
        Self {
            amount,
            mode,
            proof_url: None,
            recorded_by: None,
        }
    }

    pub fn proof(mut self, url: &str) -> Self {
        self.proof_url = Some(url.to_string());
        self
    }

    pub fn recorded_by(mut self, recorder: &str) -> Self {
        self.recorded_by = Some(recorder.to_string());
        self
    }

    fn validate_amount(&self) -> LedgerResult<()> {
        check_scale("amount", self.amount)?;
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "payment must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Payment Reconciliation
pub struct PaymentReconciliation<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PaymentReconciliation<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Record a payment against an expense of the caller's organization
    pub async fn add_payment(
        &self,
        tenant: &TenantContext,
        document_number: &str,
        payment: NewPayment,
    ) -> LedgerResult<PaymentReceipt> {
        let document_number = document_number.trim();
        let max_attempts = self.ctx.config().payment_max_attempts;

        for attempt in 1..=max_attempts {
            let outcome = self
                .ctx
                .with_write_timeout("payment", self.try_apply(tenant, document_number, &payment))
                .await;

            match outcome {
                Ok(Some(receipt)) => {
                    info!(
                        org_id = tenant.organization_id(),
                        document_no = document_number,
                        amount = %receipt.payment.amount,
                        balance = %receipt.expense.balance_amount,
                        status = %receipt.expense.status,
                        attempt,
                        "payment recorded"
                    );
                    return Ok(receipt);
                }
                Ok(None) => {
                    debug!(document_no = document_number, attempt, "balance moved, retrying");
                }
                Err(e) if e.is_busy() => {
                    debug!(document_no = document_number, attempt, error = %e, "database busy, retrying");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(backoff(attempt)).await;
        }

        Err(LedgerError::Contention {
            operation: "payment",
            attempts: max_attempts,
        })
    }

    /// Upload the proof, then record the payment.
    ///
    /// The expense and amount are checked first so a rejected payment leaves
    /// no file behind. The balance is checked again when writing.
    pub async fn add_payment_with_proof(
        &self,
        tenant: &TenantContext,
        document_number: &str,
        mut payment: NewPayment,
        proof: ProofUpload,
    ) -> LedgerResult<PaymentReceipt> {
        let expense = ExpenseLedger::new(self.ctx)
            .get_expense(tenant, document_number)
            .await?;
        payment.validate_amount()?;
        check_balance(&expense, payment.amount)?;

        let gateway = ProofGateway::new(self.ctx);
        payment.proof_url = Some(gateway.upload(&proof).await?);

        self.add_payment(tenant, document_number, payment).await
    }

    /// One attempt. `Ok(None)` means the compare-and-swap lost; the
    /// transaction has been dropped and rolled back.
    async fn try_apply(
        &self,
        tenant: &TenantContext,
        document_number: &str,
        input: &NewPayment,
    ) -> LedgerResult<Option<PaymentReceipt>> {
        let org_id = tenant.organization_id();
        let mut tx = self.ctx.pool().begin().await?;

        let row = ExpenseRepo::get_by_no(&mut *tx, org_id, document_number)
            .await?
            .ok_or_else(|| LedgerError::not_found("Expense", document_number))?;
        let expense = Expense::try_from(row)?;

        input.validate_amount()?;
        check_balance(&expense, input.amount)?;

        let payment = Payment::new(org_id, &expense.id, input.amount, input.mode)
            .with_proof(input.proof_url.clone())
            .with_recorder(input.recorded_by.as_deref().and_then(RecordedBy::from_raw));
        PaymentRepo::insert(&mut *tx, &payment).await?;

        let settlement = expense.settle(input.amount);
        let swapped = ExpenseRepo::apply_settlement(
            &mut *tx,
            org_id,
            &expense.id,
            expense.paid_amount,
            &settlement,
        )
        .await?;
        if !swapped {
            return Ok(None);
        }

        tx.commit().await?;

        let expense = Expense {
            paid_amount: settlement.paid,
            balance_amount: settlement.balance,
            status: settlement.status,
            ..expense
        };
        Ok(Some(PaymentReceipt { payment, expense }))
    }
}

fn check_balance(expense: &Expense, amount: Decimal) -> LedgerResult<()> {
    if amount > expense.balance_amount {
        return Err(LedgerError::exceeds_balance(amount, expense.balance_amount));
    }
    Ok(())
}
