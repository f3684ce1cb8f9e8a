//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, run_migrations, ExpenseRepo, OrganizationRepo, PaymentRepo,
    SequenceRepo, UserRepo, BUSY_TIMEOUT,
};
pub use schema::{ExpenseRow, OrganizationRow, PaymentRow, UserRow, SCHEMA_SQL};
