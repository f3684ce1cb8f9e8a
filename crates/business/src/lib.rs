//! # Expensebook Business
//!
//! Business logic layer - identity resolution, document numbering, proof
//! uploads, the expense ledger and payment reconciliation.
//!
//! ```rust,ignore
//! let ctx = ServiceContext::new(&db, LedgerConfig::default(), Arc::new(LocalProofStore::new("proofs")));
//! let tenant = IdentityResolver::new(&ctx).resolve(Some(&principal)).await?;
//! let receipt = ExpenseLedger::new(&ctx)
//!     .create_expense(&tenant, NewExpense::new(dec!(1000), dec!(0)).invoice_proof(&url))
//!     .await?;
//! PaymentReconciliation::new(&ctx)
//!     .add_payment(&tenant, receipt.document_number(), NewPayment::new(dec!(250), PaymentMode::Upi))
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod members;
pub mod proof;
pub mod reconciliation;
pub mod sequence;
pub mod services;

pub use config::{ConfigError, LedgerConfig};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use identity::{IdentityResolver, SignupDecision, INVITE_ONLY_REASON};
pub use ledger::{ExpenseLedger, NewExpense};
pub use members::{Member, MemberService};
pub use proof::{LocalProofStore, ProofGateway, ProofStore, ProofUpload};
pub use reconciliation::{NewPayment, PaymentReconciliation};
pub use sequence::SequenceGenerator;
pub use services::{ExpenseReceipt, PaymentReceipt, ServiceContext, TenantContext};
