//! # Expensebook Core
//!
//! Domain types for the expense ledger: organizations, users and their
//! membership state, expenses, payments and money helpers.
//!
//! Nothing in this crate touches storage; derivation rules (balance, status,
//! credit classification) are pure functions so the service layer and the
//! tests share a single definition.

pub mod error;
pub mod expense;
pub mod money;
pub mod organization;
pub mod payment;
pub mod user;

pub use error::{CoreError, CoreResult};
pub use expense::{CreditStatus, DocumentNumber, Expense, ExpenseStatus, Settlement};
pub use organization::{Organization, DEFAULT_ORGANIZATION_NAME};
pub use payment::{Payment, PaymentMode, RecordedBy};
pub use user::{is_valid_email, normalize_email, Membership, Principal, Role, User};
