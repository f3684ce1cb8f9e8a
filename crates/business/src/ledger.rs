//! Expense ledger - recording expenses and reading them back
//!
//! Creation reserves a document number first, then writes the expense and
//! its optional first payment in one transaction. Reservation and insert
//! share one write timeout. A failed or timed-out write abandons the number.

use crate::error::{LedgerError, LedgerResult};
use crate::proof::{ProofGateway, ProofUpload};
use crate::sequence::SequenceGenerator;
use crate::services::{ExpenseReceipt, ServiceContext, TenantContext};
use chrono::{NaiveDate, Utc};
use expensebook_core::money::MONEY_SCALE;
use expensebook_core::{
    CreditStatus, DocumentNumber, Expense, Payment, PaymentMode, RecordedBy, Settlement,
};
use expensebook_persistence::{ExpenseRepo, PaymentRepo};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Input for a new expense
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub total: Decimal,
    pub paid_now: Decimal,
    pub site_id: Option<String>,
    pub category_id: Option<String>,
    pub vendor_id: Option<String>,
    pub invoice_proof_url: String,
    pub payment_proof_url: Option<String>,
    /// Mode of the first payment, Cash when absent
    pub payment_mode: Option<PaymentMode>,
    /// A user id, or any free-text name
    pub recorded_by: Option<String>,
    pub expense_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl NewExpense {
    pub fn new(total: Decimal, paid_now: Decimal) -> Self {
        Self {
            total,
            paid_now,
            ..Default::default()
        }
    }

    pub fn invoice_proof(mut self, url: &str) -> Self {
        self.invoice_proof_url = url.to_string();
        self
    }

    pub fn payment_proof(mut self, url: &str) -> Self {
        self.payment_proof_url = Some(url.to_string());
        self
    }

    pub fn mode(mut self, mode: PaymentMode) -> Self {
        self.payment_mode = Some(mode);
        self
    }

    pub fn recorded_by(mut self, recorder: &str) -> Self {
        self.recorded_by = Some(recorder.to_string());
        self
    }

    pub fn site(mut self, site_id: &str) -> Self {
        self.site_id = Some(site_id.to_string());
        self
    }

    pub fn category(mut self, category_id: &str) -> Self {
        self.category_id = Some(category_id.to_string());
        self
    }

    pub fn vendor(mut self, vendor_id: &str) -> Self {
        self.vendor_id = Some(vendor_id.to_string());
        self
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.expense_date = Some(date);
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Amount rules, checked before anything is uploaded or reserved
    pub fn validate_amounts(&self) -> LedgerResult<()> {
        check_scale("total", self.total)?;
        if self.total <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "total must be positive, got {}",
                self.total
            )));
        }

        check_scale("paid", self.paid_now)?;
        if self.paid_now < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "paid cannot be negative, got {}",
                self.paid_now
            )));
        }
        if self.paid_now > self.total {
            return Err(LedgerError::InvalidAmount(format!(
                "paid cannot exceed total ({} > {})",
                self.paid_now, self.total
            )));
        }
        Ok(())
    }

    /// All preconditions of [`ExpenseLedger::create_expense`], in order
    pub fn validate(&self) -> LedgerResult<()> {
        self.validate_amounts()?;

        if self.invoice_proof_url.trim().is_empty() {
            return Err(LedgerError::MissingProof(
                "invoice proof is required".to_string(),
            ));
        }
        if self.paid_now > Decimal::ZERO && is_blank(&self.payment_proof_url) {
            return Err(LedgerError::MissingProof(
                "payment proof is required when paying at creation".to_string(),
            ));
        }
        Ok(())
    }

    fn into_records(self, org_id: &str, expense_no: DocumentNumber) -> (Expense, Option<Payment>) {
        let settlement = Settlement::derive(self.total, self.paid_now);
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            organization_id: org_id.to_string(),
            expense_no,
            expense_date: self.expense_date,
            site_id: non_blank(self.site_id),
            category_id: non_blank(self.category_id),
            vendor_id: non_blank(self.vendor_id),
            description: non_blank(self.description),
            total_amount: self.total,
            paid_amount: settlement.paid,
            balance_amount: settlement.balance,
            status: settlement.status,
            credit_status: CreditStatus::classify(self.paid_now, settlement.balance),
            bill_image_url: self.invoice_proof_url.trim().to_string(),
            first_payment_proof: None,
            created_at: Utc::now(),
        };

        if self.paid_now <= Decimal::ZERO {
            return (expense, None);
        }

        let proof = non_blank(self.payment_proof_url);
        let payment = Payment::new(
            org_id,
            &expense.id,
            self.paid_now,
            self.payment_mode.unwrap_or_default(),
        )
        .with_proof(proof.clone())
        .with_recorder(self.recorded_by.as_deref().and_then(RecordedBy::from_raw));

        let expense = Expense {
            first_payment_proof: proof,
            ..expense
        };
        (expense, Some(payment))
    }
}

/// Expense Ledger
pub struct ExpenseLedger<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ExpenseLedger<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Record an expense, with its first payment when `paid_now > 0`
    pub async fn create_expense(
        &self,
        tenant: &TenantContext,
        draft: NewExpense,
    ) -> LedgerResult<ExpenseReceipt> {
        draft.validate()?;

        let org_id = tenant.organization_id();
        let pool = self.ctx.pool();
        let (expense, first_payment) = self
            .ctx
            .with_write_timeout("expense creation", async {
                let expense_no = SequenceGenerator::new(self.ctx).next_number(tenant).await?;
                let seq_no = expense_no.sequence().ok_or_else(|| {
                    LedgerError::InvalidInput(format!("bad document number {}", expense_no))
                })?;
                let (expense, first_payment) = draft.into_records(org_id, expense_no);

                let mut tx = pool.begin().await?;
                ExpenseRepo::insert(&mut *tx, &expense, seq_no).await?;
                if let Some(payment) = &first_payment {
                    PaymentRepo::insert(&mut *tx, payment).await?;
                }
                tx.commit().await?;
                Ok::<_, LedgerError>((expense, first_payment))
            })
            .await?;

        info!(
            org_id,
            document_no = %expense.expense_no,
            total = %expense.total_amount,
            paid = %expense.paid_amount,
            credit = %expense.credit_status,
            "expense recorded"
        );

        Ok(ExpenseReceipt {
            expense,
            first_payment,
        })
    }

    /// Upload the proofs, then record the expense with their URLs.
    ///
    /// Amounts are validated first so a rejected request leaves no files.
    pub async fn create_expense_with_proofs(
        &self,
        tenant: &TenantContext,
        mut draft: NewExpense,
        invoice: ProofUpload,
        payment_proof: Option<ProofUpload>,
    ) -> LedgerResult<ExpenseReceipt> {
        draft.validate_amounts()?;
        if draft.paid_now > Decimal::ZERO && payment_proof.is_none() && is_blank(&draft.payment_proof_url) {
            return Err(LedgerError::MissingProof(
                "payment proof is required when paying at creation".to_string(),
            ));
        }

        // a payment proof only belongs to an expense paid at creation
        let payment_proof = payment_proof.filter(|_| draft.paid_now > Decimal::ZERO);

        let gateway = ProofGateway::new(self.ctx);
        gateway.check(&invoice)?;
        if let Some(proof) = &payment_proof {
            gateway.check(proof)?;
        }

        draft.invoice_proof_url = gateway.upload(&invoice).await?;
        if let Some(proof) = &payment_proof {
            draft.payment_proof_url = Some(gateway.upload(proof).await?);
        }

        self.create_expense(tenant, draft).await
    }

    /// Fetch one expense of the caller's organization
    pub async fn get_expense(&self, tenant: &TenantContext, document_number: &str) -> LedgerResult<Expense> {
        let row = ExpenseRepo::get_by_no(self.ctx.pool(), tenant.organization_id(), document_number.trim())
            .await?
            .ok_or_else(|| LedgerError::not_found("Expense", document_number.trim()))?;
        Ok(Expense::try_from(row)?)
    }

    /// Most recent expenses first
    pub async fn list_expenses(&self, tenant: &TenantContext, limit: u32) -> LedgerResult<Vec<Expense>> {
        let rows = ExpenseRepo::list_by_org(self.ctx.pool(), tenant.organization_id(), i64::from(limit)).await?;
        rows.into_iter()
            .map(|row| Expense::try_from(row).map_err(LedgerError::from))
            .collect()
    }

    /// Payments of an expense, oldest first
    pub async fn payment_history(&self, tenant: &TenantContext, document_number: &str) -> LedgerResult<Vec<Payment>> {
        let expense = self.get_expense(tenant, document_number).await?;
        let rows = PaymentRepo::list_by_expense(self.ctx.pool(), tenant.organization_id(), &expense.id).await?;
        rows.into_iter()
            .map(|row| Payment::try_from(row).map_err(LedgerError::from))
            .collect()
    }
}

/// Reject amounts with more than two decimal places
pub(crate) fn check_scale(field: &str, amount: Decimal) -> LedgerResult<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::InvalidAmount(format!(
            "{} {} has more than {} decimal places",
            field, amount, MONEY_SCALE
        )));
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
