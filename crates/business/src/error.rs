//! Business layer errors
//!
//! `LedgerError` is the taxonomy callers match on. Lower layers convert into
//! it with `#[from]`; `kind()` flattens the variants for programmatic use.

use crate::config::ConfigError;
use expensebook_core::CoreError;
use expensebook_persistence::PersistenceError;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Ledger operation errors
#[derive(Debug, Error)]
pub enum LedgerError {
    // === Identity errors ===
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Lookup errors ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // === Validation errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Payment of {amount} exceeds outstanding balance {balance}")]
    ExceedsBalance { amount: Decimal, balance: Decimal },

    #[error("Missing proof: {0}")]
    MissingProof(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // === Collaborator errors ===
    #[error("Upload failed: {0}")]
    UploadError(String),

    // === Storage errors ===
    #[error("Sequence conflict: {0}")]
    SequenceConflict(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Persistence error: {operation} timed out after {timeout_ms}ms")]
    WriteTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Persistence error: {operation} gave up after {attempts} attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Flat classification of [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotAuthenticated,
    Forbidden,
    NotFound,
    InvalidAmount,
    ExceedsBalance,
    MissingProof,
    InvalidInput,
    UploadError,
    SequenceConflict,
    PersistenceError,
    Config,
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn exceeds_balance(amount: Decimal, balance: Decimal) -> Self {
        Self::ExceedsBalance { amount, balance }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated(_) => ErrorKind::NotAuthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::ExceedsBalance { .. } => ErrorKind::ExceedsBalance,
            Self::MissingProof(_) => ErrorKind::MissingProof,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UploadError(_) => ErrorKind::UploadError,
            Self::SequenceConflict(_) => ErrorKind::SequenceConflict,
            Self::Persistence(_) | Self::WriteTimeout { .. } | Self::Contention { .. } => {
                ErrorKind::PersistenceError
            }
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Lost a race for the database write lock; the unit of work may be retried
    pub(crate) fn is_busy(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_busy())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(PersistenceError::from(err))
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAmount(reason) => Self::InvalidAmount(reason),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exceeds_balance_message() {
        let err = LedgerError::exceeds_balance(dec!(700), dec!(600));
        assert_eq!(
            err.to_string(),
            "Payment of 700 exceeds outstanding balance 600"
        );
        assert_eq!(err.kind(), ErrorKind::ExceedsBalance);
    }

    #[test]
    fn test_storage_failures_share_a_kind() {
        let timeout = LedgerError::WriteTimeout {
            operation: "payment",
            timeout_ms: 10,
        };
        let exhausted = LedgerError::Contention {
            operation: "sequence reservation",
            attempts: 5,
        };
        let db: LedgerError = PersistenceError::not_found("Expense", "EX-1").into();
        assert_eq!(timeout.kind(), ErrorKind::PersistenceError);
        assert_eq!(exhausted.kind(), ErrorKind::PersistenceError);
        assert_eq!(db.kind(), ErrorKind::PersistenceError);
    }

    #[test]
    fn test_core_error_mapping() {
        let err: LedgerError = CoreError::InvalidAmount("1.005".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err: LedgerError = CoreError::InvalidPaymentMode("Cheque".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("Cheque"));
    }
}
