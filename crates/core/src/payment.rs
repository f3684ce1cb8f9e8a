//! # Payment Module
//!
//! Append-only payment records against an expense.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMode {
    #[default]
    Cash,
    #[serde(rename = "UPI")]
    Upi,
    Bank,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Upi => "UPI",
            PaymentMode::Bank => "Bank",
        }
    }

    /// Case-insensitive parse
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "upi" => Ok(PaymentMode::Upi),
            "bank" => Ok(PaymentMode::Bank),
            _ => Err(CoreError::InvalidPaymentMode(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who recorded a payment.
///
/// Identities that look like a user reference (a UUID) are kept as one.
/// Anything else is stored only as free text; no lookup is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordedBy {
    User(String),
    Name(String),
}

impl RecordedBy {
    /// Classify a raw recorder string. Blank input yields `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match Uuid::parse_str(raw) {
            Ok(id) => Some(RecordedBy::User(id.to_string())),
            Err(_) => Some(RecordedBy::Name(raw.to_string())),
        }
    }

    /// Split into the (user reference, free-text name) storage columns
    pub fn into_columns(recorded_by: Option<Self>) -> (Option<String>, Option<String>) {
        match recorded_by {
            Some(RecordedBy::User(id)) => (Some(id), None),
            Some(RecordedBy::Name(name)) => (None, Some(name)),
            None => (None, None),
        }
    }

    /// Inverse of [`RecordedBy::into_columns`]; a user reference wins
    pub fn from_columns(user_id: Option<String>, name: Option<String>) -> Option<Self> {
        user_id
            .map(RecordedBy::User)
            .or_else(|| name.map(RecordedBy::Name))
    }
}

impl fmt::Display for RecordedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedBy::User(id) => write!(f, "user:{}", id),
            RecordedBy::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A payment against an expense. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub organization_id: String,
    pub expense_id: String,
    pub amount: Decimal,
    pub payment_mode: PaymentMode,
    pub proof_url: Option<String>,
    pub recorded_by: Option<RecordedBy>,
    pub paid_date: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        organization_id: &str,
        expense_id: &str,
        amount: Decimal,
        payment_mode: PaymentMode,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            expense_id: expense_id.to_string(),
            amount,
            payment_mode,
            proof_url: None,
            recorded_by: None,
            paid_date: Utc::now(),
        }
    }

    pub fn with_proof(mut self, proof_url: Option<String>) -> Self {
        self.proof_url = proof_url.filter(|url| !url.trim().is_empty());
        self
    }

    pub fn with_recorder(mut self, recorded_by: Option<RecordedBy>) -> Self {
        self.recorded_by = recorded_by;
        self
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {}",
            self.paid_date.format("%Y-%m-%d %H:%M"),
            self.amount,
            self.payment_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_mode_parse() {
        assert_eq!(PaymentMode::parse("upi").unwrap(), PaymentMode::Upi);
        assert_eq!(PaymentMode::parse(" BANK ").unwrap(), PaymentMode::Bank);
        assert_eq!(PaymentMode::default(), PaymentMode::Cash);
        assert!(PaymentMode::parse("cheque").is_err());
    }

    #[test]
    fn test_recorded_by_uuid_becomes_user() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(RecordedBy::from_raw(&id), Some(RecordedBy::User(id.clone())));
        assert_eq!(
            RecordedBy::into_columns(RecordedBy::from_raw(&id)),
            (Some(id), None)
        );
    }

    #[test]
    fn test_recorded_by_falls_back_to_name() {
        let r = RecordedBy::from_raw("Site Supervisor");
        assert_eq!(r, Some(RecordedBy::Name("Site Supervisor".to_string())));
        assert_eq!(
            RecordedBy::into_columns(r),
            (None, Some("Site Supervisor".to_string()))
        );
        assert_eq!(RecordedBy::from_raw("   "), None);
    }

    #[test]
    fn test_recorded_by_from_columns() {
        assert_eq!(
            RecordedBy::from_columns(Some("u".into()), Some("n".into())),
            Some(RecordedBy::User("u".into()))
        );
        assert_eq!(RecordedBy::from_columns(None, None), None);
    }

    #[test]
    fn test_payment_builder_drops_blank_proof() {
        let p = Payment::new("org", "exp", dec!(10), PaymentMode::Upi).with_proof(Some("  ".into()));
        assert_eq!(p.proof_url, None);
        assert_eq!(p.amount, dec!(10));
    }
}
