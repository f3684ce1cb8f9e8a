//! Database schema definitions
//!
//! DDL for the ledger tables and row types for sqlx mapping.
//! Money columns are TEXT holding the canonical two-digit form produced by
//! `expensebook_core::money::to_storage`.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, NaiveDate, Utc};
use expensebook_core::{
    CreditStatus, DocumentNumber, Expense, ExpenseStatus, Membership, Organization, Payment,
    PaymentMode, RecordedBy, Role, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Idempotent schema script. Every expense/payment row carries `org_id` so
/// tenant filtering never needs a join.
pub const SCHEMA_SQL: &str = r#"
-- Tenants
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- One document counter per organization
CREATE TABLE IF NOT EXISTS org_sequences (
    org_id TEXT PRIMARY KEY,
    last_no INTEGER NOT NULL,
    FOREIGN KEY (org_id) REFERENCES organizations(id)
);

-- Users: invited rows have no auth_user_id yet
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name TEXT,
    role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
    org_id TEXT,
    auth_user_id TEXT UNIQUE,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CHECK (auth_user_id IS NULL OR org_id IS NOT NULL),
    FOREIGN KEY (org_id) REFERENCES organizations(id)
);

-- Expenses
CREATE TABLE IF NOT EXISTS expenses (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    expense_no TEXT NOT NULL,
    seq_no INTEGER NOT NULL,
    expense_date DATE,
    site_id TEXT,
    category_id TEXT,
    vendor_id TEXT,
    description TEXT,
    total_amount TEXT NOT NULL,
    paid_amount TEXT NOT NULL,
    balance_amount TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('OPEN', 'CLOSED')),
    credit_status TEXT NOT NULL CHECK (credit_status IN ('NO_CREDIT', 'FULL_CREDIT', 'PARTIAL_CREDIT')),
    bill_image_url TEXT NOT NULL,
    first_payment_proof TEXT,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (org_id, expense_no),
    FOREIGN KEY (org_id) REFERENCES organizations(id)
);

-- Payments (append-only)
CREATE TABLE IF NOT EXISTS expense_payments (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    expense_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    payment_mode TEXT NOT NULL CHECK (payment_mode IN ('Cash', 'UPI', 'Bank')),
    proof_url TEXT,
    recorded_by_user_id TEXT,
    recorded_by_name TEXT,
    paid_date DATETIME NOT NULL,
    FOREIGN KEY (org_id) REFERENCES organizations(id),
    FOREIGN KEY (expense_id) REFERENCES expenses(id)
);

CREATE INDEX IF NOT EXISTS idx_expenses_org_seq ON expenses(org_id, seq_no);
CREATE INDEX IF NOT EXISTS idx_payments_expense ON expense_payments(expense_id, paid_date);
"#;

/// Row type for `organizations`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for `users`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub org_id: Option<String>,
    pub auth_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `expenses`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ExpenseRow {
    pub id: String,
    pub org_id: String,
    pub expense_no: String,
    pub seq_no: i64,
    pub expense_date: Option<NaiveDate>,
    pub site_id: Option<String>,
    pub category_id: Option<String>,
    pub vendor_id: Option<String>,
    pub description: Option<String>,
    pub total_amount: String, // Decimal stored as TEXT
    pub paid_amount: String,  // Decimal stored as TEXT
    pub balance_amount: String,
    pub status: String,
    pub credit_status: String,
    pub bill_image_url: String,
    pub first_payment_proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `expense_payments`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: String,
    pub org_id: String,
    pub expense_id: String,
    pub amount: String, // Decimal stored as TEXT
    pub payment_mode: String,
    pub proof_url: Option<String>,
    pub recorded_by_user_id: Option<String>,
    pub recorded_by_name: Option<String>,
    pub paid_date: DateTime<Utc>,
}

fn decimal(field: &str, text: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| PersistenceError::InvalidDecimal(format!("{} = {}: {}", field, text, e)))
}

// === Conversion implementations ===

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = PersistenceError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).map_err(|_| PersistenceError::invalid_enum("role", &row.role))?;
        let membership = Membership::from_columns(row.auth_user_id, row.org_id).ok_or_else(|| {
            PersistenceError::corrupt_row("users", format!("user {} is linked but has no organization", row.id))
        })?;
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            membership,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = PersistenceError;

    fn try_from(row: ExpenseRow) -> Result<Self, Self::Error> {
        let status = ExpenseStatus::parse(&row.status)
            .map_err(|_| PersistenceError::invalid_enum("status", &row.status))?;
        let credit_status = CreditStatus::parse(&row.credit_status)
            .map_err(|_| PersistenceError::invalid_enum("credit_status", &row.credit_status))?;
        let expense_no = DocumentNumber::parse(&row.expense_no)
            .map_err(|_| PersistenceError::invalid_enum("expense_no", &row.expense_no))?;
        Ok(Expense {
            total_amount: decimal("total_amount", &row.total_amount)?,
            paid_amount: decimal("paid_amount", &row.paid_amount)?,
            balance_amount: decimal("balance_amount", &row.balance_amount)?,
            id: row.id,
            organization_id: row.org_id,
            expense_no,
            expense_date: row.expense_date,
            site_id: row.site_id,
            category_id: row.category_id,
            vendor_id: row.vendor_id,
            description: row.description,
            status,
            credit_status,
            bill_image_url: row.bill_image_url,
            first_payment_proof: row.first_payment_proof,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PersistenceError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let payment_mode = PaymentMode::parse(&row.payment_mode)
            .map_err(|_| PersistenceError::invalid_enum("payment_mode", &row.payment_mode))?;
        Ok(Payment {
            amount: decimal("amount", &row.amount)?,
            id: row.id,
            organization_id: row.org_id,
            expense_id: row.expense_id,
            payment_mode,
            proof_url: row.proof_url,
            recorded_by: RecordedBy::from_columns(row.recorded_by_user_id, row.recorded_by_name),
            paid_date: row.paid_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense_row() -> ExpenseRow {
        ExpenseRow {
            id: "e1".into(),
            org_id: "o1".into(),
            expense_no: "EX-1001".into(),
            seq_no: 1001,
            expense_date: None,
            site_id: None,
            category_id: None,
            vendor_id: None,
            description: None,
            total_amount: "1000.00".into(),
            paid_amount: "400.00".into(),
            balance_amount: "600.00".into(),
            status: "OPEN".into(),
            credit_status: "PARTIAL_CREDIT".into(),
            bill_image_url: "file:///bill.png".into(),
            first_payment_proof: Some("file:///proof.png".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expense_row_conversion() {
        let expense = Expense::try_from(expense_row()).unwrap();
        assert_eq!(expense.expense_no.as_str(), "EX-1001");
        assert_eq!(expense.credit_status, CreditStatus::PartialCredit);
        assert!(expense.is_consistent());
    }

    #[test]
    fn test_expense_row_with_bad_status() {
        let mut row = expense_row();
        row.status = "PENDING".into();
        let err = Expense::try_from(row).unwrap_err();
        assert!(err.to_string().contains("status = PENDING"));
    }

    #[test]
    fn test_expense_row_with_bad_amount() {
        let mut row = expense_row();
        row.paid_amount = "four hundred".into();
        assert!(matches!(
            Expense::try_from(row),
            Err(PersistenceError::InvalidDecimal(_))
        ));
    }

    #[test]
    fn test_user_row_states() {
        let row = UserRow {
            id: "u1".into(),
            email: "a@b.co".into(),
            name: None,
            role: "user".into(),
            org_id: Some("o1".into()),
            auth_user_id: None,
            created_at: Utc::now(),
        };
        let user = User::try_from(row.clone()).unwrap();
        assert!(!user.membership.is_active());

        let broken = UserRow {
            org_id: None,
            auth_user_id: Some("ext".into()),
            ..row
        };
        assert!(matches!(
            User::try_from(broken),
            Err(PersistenceError::CorruptRow { .. })
        ));
    }

    #[test]
    fn test_payment_row_recorder_columns() {
        let row = PaymentRow {
            id: "p1".into(),
            org_id: "o1".into(),
            expense_id: "e1".into(),
            amount: "600.00".into(),
            payment_mode: "UPI".into(),
            proof_url: None,
            recorded_by_user_id: None,
            recorded_by_name: Some("Ravi".into()),
            paid_date: Utc::now(),
        };
        let payment = Payment::try_from(row).unwrap();
        assert_eq!(payment.payment_mode, PaymentMode::Upi);
        assert_eq!(payment.recorded_by, Some(RecordedBy::Name("Ravi".into())));
    }
}
