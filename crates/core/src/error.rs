//! # Error Module
//!
//! Domain errors for Expensebook, built with thiserror.

use thiserror::Error;

/// Core domain errors.
///
/// Pure validation failures, independent of storage or services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Identity errors ===
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    // === Ledger enum errors ===
    #[error("Invalid expense status: {0}")]
    InvalidStatus(String),

    #[error("Invalid credit status: {0}")]
    InvalidCreditStatus(String),

    #[error("Invalid payment mode: {0}")]
    InvalidPaymentMode(String),

    #[error("Invalid document number: {0}")]
    InvalidDocumentNumber(String),
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the error comes from parsing or validating an amount
    pub fn is_amount_error(&self) -> bool {
        matches!(self, CoreError::InvalidAmount(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidAmount("-5".to_string());
        assert_eq!(err.to_string(), "Invalid amount: -5");

        let err = CoreError::InvalidPaymentMode("Cheque".to_string());
        assert_eq!(err.to_string(), "Invalid payment mode: Cheque");
    }

    #[test]
    fn test_error_checks() {
        assert!(CoreError::InvalidAmount("x".to_string()).is_amount_error());
        assert!(!CoreError::InvalidRole("owner".to_string()).is_amount_error());
    }
}
