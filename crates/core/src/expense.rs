//! # Expense Module
//!
//! The ledger's core entity and the rules deriving its state.
//!
//! Invariants held by every `Expense`:
//! - `balance == total - paid`
//! - `paid <= total`
//! - `status == Closed` iff `balance <= 0`
//!
//! Credit classification is a point-in-time label computed once at creation
//! and never revisited, while status follows every payment.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open/closed state of an expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Open,
    Closed,
}

impl ExpenseStatus {
    /// `Closed` iff nothing remains to be paid
    pub fn for_balance(balance: Decimal) -> Self {
        if balance <= Decimal::ZERO {
            ExpenseStatus::Closed
        } else {
            ExpenseStatus::Open
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Open => "OPEN",
            ExpenseStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "OPEN" => Ok(ExpenseStatus::Open),
            "CLOSED" => Ok(ExpenseStatus::Closed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much of the expense was left unpaid when it was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditStatus {
    /// Settled in full at creation
    NoCredit,
    /// Nothing paid at creation
    FullCredit,
    /// Part paid at creation, part outstanding
    PartialCredit,
}

impl CreditStatus {
    /// Classify an expense at creation time.
    ///
    /// ```
    /// use expensebook_core::CreditStatus;
    /// use rust_decimal::Decimal;
    ///
    /// let d = |n| Decimal::new(n, 0);
    /// assert_eq!(CreditStatus::classify(d(0), d(1000)), CreditStatus::FullCredit);
    /// assert_eq!(CreditStatus::classify(d(400), d(600)), CreditStatus::PartialCredit);
    /// assert_eq!(CreditStatus::classify(d(1000), d(0)), CreditStatus::NoCredit);
    /// ```
    pub fn classify(paid_now: Decimal, balance: Decimal) -> Self {
        if paid_now == Decimal::ZERO {
            CreditStatus::FullCredit
        } else if balance > Decimal::ZERO {
            CreditStatus::PartialCredit
        } else {
            CreditStatus::NoCredit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::NoCredit => "NO_CREDIT",
            CreditStatus::FullCredit => "FULL_CREDIT",
            CreditStatus::PartialCredit => "PARTIAL_CREDIT",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "NO_CREDIT" => Ok(CreditStatus::NoCredit),
            "FULL_CREDIT" => Ok(CreditStatus::FullCredit),
            "PARTIAL_CREDIT" => Ok(CreditStatus::PartialCredit),
            other => Err(CoreError::InvalidCreditStatus(other.to_string())),
        }
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-facing expense identifier, unique within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentNumber(String);

impl DocumentNumber {
    /// Default prefix for expense numbers
    pub const DEFAULT_PREFIX: &'static str = "EX-";

    pub fn new(prefix: &str, number: i64) -> Self {
        Self(format!("{}{}", prefix, number))
    }

    /// Wrap an identifier typed by a user or read from storage
    pub fn parse(s: &str) -> CoreResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(CoreError::InvalidDocumentNumber(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing sequence number
    pub fn sequence(&self) -> Option<i64> {
        let digits_start = self
            .0
            .rfind(|c: char| !c.is_ascii_digit())
            .map_or(0, |i| i + 1);
        self.0[digits_start..].parse().ok()
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derived paid/balance/status triple for a given total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub paid: Decimal,
    pub balance: Decimal,
    pub status: ExpenseStatus,
}

impl Settlement {
    pub fn derive(total: Decimal, paid: Decimal) -> Self {
        let balance = total - paid;
        Self {
            paid,
            balance,
            status: ExpenseStatus::for_balance(balance),
        }
    }
}

/// A recorded expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub organization_id: String,
    pub expense_no: DocumentNumber,
    pub expense_date: Option<NaiveDate>,
    pub site_id: Option<String>,
    pub category_id: Option<String>,
    pub vendor_id: Option<String>,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub status: ExpenseStatus,
    pub credit_status: CreditStatus,
    pub bill_image_url: String,
    pub first_payment_proof: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// State after applying one more payment. Credit status is untouched.
    pub fn settle(&self, amount: Decimal) -> Settlement {
        Settlement::derive(self.total_amount, self.paid_amount + amount)
    }

    /// Check the stored aggregates against the ledger invariants
    pub fn is_consistent(&self) -> bool {
        self.balance_amount == self.total_amount - self.paid_amount
            && self.paid_amount <= self.total_amount
            && self.paid_amount >= Decimal::ZERO
            && self.status == ExpenseStatus::for_balance(self.balance_amount)
    }

    pub fn is_closed(&self) -> bool {
        self.status == ExpenseStatus::Closed
    }
}

impl fmt::Display for Expense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total {} paid {} balance {} [{} / {}]",
            self.expense_no,
            self.total_amount,
            self.paid_amount,
            self.balance_amount,
            self.status,
            self.credit_status
        )
    }
}
