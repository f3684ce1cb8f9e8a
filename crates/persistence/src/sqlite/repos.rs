//! Repository implementations for SQLite
//!
//! Every function is a single SQL statement and accepts any sqlx executor,
//! so the same call works on the pool or inside an open transaction
//! (`&mut *tx`). Multi-statement units of work live in the service layer.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use expensebook_core::money::to_storage;
use expensebook_core::{Expense, Organization, Payment, RecordedBy, Role, Settlement, User};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Organization Repository
// ============================================================================

/// Repository for the organizations table
pub struct OrganizationRepo;

impl OrganizationRepo {
    /// Get organization by ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<OrganizationRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Organization", id))
    }

    /// Insert a new organization
    pub async fn insert<'e, E>(executor: E, org: &Organization) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&org.id)
            .bind(&org.name)
            .bind(org.created_at)
            .execute(executor)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Sequence Repository
// ============================================================================

/// Repository for the per-organization document counters
pub struct SequenceRepo;

impl SequenceRepo {
    /// Create the counter at `floor`. A counter that already exists is left alone.
    pub async fn create<'e, E>(executor: E, org_id: &str, floor: i64) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT INTO org_sequences (org_id, last_no) VALUES (?, ?) ON CONFLICT(org_id) DO NOTHING",
        )
        .bind(org_id)
        .bind(floor)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Atomically increment the counter and return the new value.
    ///
    /// Returns `None` when the organization has no counter row.
    pub async fn increment<'e, E>(executor: E, org_id: &str) -> PersistenceResult<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE org_sequences SET last_no = last_no + 1 WHERE org_id = ? RETURNING last_no",
        )
        .bind(org_id)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(|(n,)| n))
    }

    /// Last issued number, if the counter exists
    pub async fn current<'e, E>(executor: E, org_id: &str) -> PersistenceResult<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_no FROM org_sequences WHERE org_id = ?")
                .bind(org_id)
                .fetch_optional(executor)
                .await?;
        Ok(row.map(|(n,)| n))
    }
}

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the users table
pub struct UserRepo;

impl UserRepo {
    /// Find the user linked to an external identity
    pub async fn get_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
    ) -> PersistenceResult<Option<UserRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE auth_user_id = ?")
            .bind(external_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Find a user by email (the column collates NOCASE)
    pub async fn get_by_email<'e, E>(executor: E, email: &str) -> PersistenceResult<Option<UserRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Insert a user in either membership state
    pub async fn insert<'e, E>(executor: E, user: &User) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT INTO users (id, email, name, role, org_id, auth_user_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.membership.organization_id())
        .bind(user.membership.external_id())
        .bind(user.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Link an invited row to an external identity.
    ///
    /// Only applies while the row is still unlinked; returns whether it did.
    pub async fn activate<'e, E>(
        executor: E,
        id: &str,
        external_id: &str,
        org_id: &str,
        role: Role,
        name: Option<&str>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET auth_user_id = ?, org_id = ?, role = ?, name = COALESCE(?, name)
            WHERE id = ? AND auth_user_id IS NULL
            "#,
        )
        .bind(external_id)
        .bind(org_id)
        .bind(role.as_str())
        .bind(name)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Count users that have signed in at least once
    pub async fn count_active<'e, E>(executor: E) -> PersistenceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE auth_user_id IS NOT NULL")
                .fetch_one(executor)
                .await?;
        Ok(row.0)
    }

    /// Active members of an organization, by name (unnamed last)
    pub async fn list_active_by_org<'e, E>(
        executor: E,
        org_id: &str,
    ) -> PersistenceResult<Vec<UserRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT * FROM users
            WHERE org_id = ? AND auth_user_id IS NOT NULL
            ORDER BY name IS NULL, name, email
            "#,
        )
        .bind(org_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Expense Repository
// ============================================================================

/// Repository for the expenses table
pub struct ExpenseRepo;

impl ExpenseRepo {
    /// Insert a new expense
    pub async fn insert<'e, E>(executor: E, expense: &Expense, seq_no: i64) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, org_id, expense_no, seq_no, expense_date, site_id, category_id, vendor_id,
                description, total_amount, paid_amount, balance_amount, status, credit_status,
                bill_image_url, first_payment_proof, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.organization_id)
        .bind(expense.expense_no.as_str())
        .bind(seq_no)
        .bind(expense.expense_date)
        .bind(&expense.site_id)
        .bind(&expense.category_id)
        .bind(&expense.vendor_id)
        .bind(&expense.description)
        .bind(to_storage(expense.total_amount))
        .bind(to_storage(expense.paid_amount))
        .bind(to_storage(expense.balance_amount))
        .bind(expense.status.as_str())
        .bind(expense.credit_status.as_str())
        .bind(&expense.bill_image_url)
        .bind(&expense.first_payment_proof)
        .bind(expense.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Get an expense by document number, scoped to one organization
    pub async fn get_by_no<'e, E>(
        executor: E,
        org_id: &str,
        expense_no: &str,
    ) -> PersistenceResult<Option<ExpenseRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ExpenseRow>(
            "SELECT * FROM expenses WHERE org_id = ? AND expense_no = ?",
        )
        .bind(org_id)
        .bind(expense_no)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Newest expenses of an organization first
    pub async fn list_by_org<'e, E>(
        executor: E,
        org_id: &str,
        limit: i64,
    ) -> PersistenceResult<Vec<ExpenseRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, ExpenseRow>(
            "SELECT * FROM expenses WHERE org_id = ? ORDER BY seq_no DESC LIMIT ?",
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Compare-and-swap the paid/balance/status aggregates.
    ///
    /// Applies only if `paid_amount` still equals `expected_paid`; returns
    /// whether the row was updated.
    pub async fn apply_settlement<'e, E>(
        executor: E,
        org_id: &str,
        id: &str,
        expected_paid: Decimal,
        settlement: &Settlement,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET paid_amount = ?, balance_amount = ?, status = ?
            WHERE org_id = ? AND id = ? AND paid_amount = ?
            "#,
        )
        .bind(to_storage(settlement.paid))
        .bind(to_storage(settlement.balance))
        .bind(settlement.status.as_str())
        .bind(org_id)
        .bind(id)
        .bind(to_storage(expected_paid))
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Payment Repository
// ============================================================================

/// Repository for the expense_payments table
pub struct PaymentRepo;

impl PaymentRepo {
    /// Append a payment
    pub async fn insert<'e, E>(executor: E, payment: &Payment) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (user_id, name) = RecordedBy::into_columns(payment.recorded_by.clone());
        sqlx::query(
            r#"
            INSERT INTO expense_payments (
                id, org_id, expense_id, amount, payment_mode, proof_url,
                recorded_by_user_id, recorded_by_name, paid_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.organization_id)
        .bind(&payment.expense_id)
        .bind(to_storage(payment.amount))
        .bind(payment.payment_mode.as_str())
        .bind(&payment.proof_url)
        .bind(user_id)
        .bind(name)
        .bind(payment.paid_date)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Payments of one expense, oldest first
    pub async fn list_by_expense<'e, E>(
        executor: E,
        org_id: &str,
        expense_id: &str,
    ) -> PersistenceResult<Vec<PaymentRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM expense_payments
            WHERE org_id = ? AND expense_id = ?
            ORDER BY paid_date ASC, rowid ASC
            "#,
        )
        .bind(org_id)
        .bind(expense_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool.
///
/// WAL journaling plus a busy timeout lets concurrent requests queue for the
/// write lock; foreign keys are enforced on every connection.
pub async fn create_pool(database_url: &str, max_connections: u32) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create the schema if it does not exist yet
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    tracing::debug!("schema ensured");
    Ok(())
}

/// Open a pool and make sure the schema exists
pub async fn init_database(database_url: &str, max_connections: u32) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(database_url, max_connections).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use expensebook_core::{CreditStatus, DocumentNumber, PaymentMode, Principal};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let pool = init_database(&url, 4).await.unwrap();
        (dir, pool)
    }

    async fn seed_org(pool: &SqlitePool) -> Organization {
        let org = Organization::new("Acme");
        OrganizationRepo::insert(pool, &org).await.unwrap();
        SequenceRepo::create(pool, &org.id, 1000).await.unwrap();
        org
    }

    fn expense(org_id: &str, no: i64, total: Decimal, paid: Decimal) -> Expense {
        let s = Settlement::derive(total, paid);
        Expense {
            id: format!("expense-{}", no),
            organization_id: org_id.to_string(),
            expense_no: DocumentNumber::new("EX-", no),
            expense_date: None,
            site_id: None,
            category_id: None,
            vendor_id: None,
            description: Some("cement".into()),
            total_amount: total,
            paid_amount: paid,
            balance_amount: s.balance,
            status: s.status,
            credit_status: CreditStatus::classify(paid, s.balance),
            bill_image_url: "file:///bill.png".into(),
            first_payment_proof: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sequence_increment() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;

        assert_eq!(SequenceRepo::increment(&pool, &org.id).await.unwrap(), Some(1001));
        assert_eq!(SequenceRepo::increment(&pool, &org.id).await.unwrap(), Some(1002));
        assert_eq!(SequenceRepo::current(&pool, &org.id).await.unwrap(), Some(1002));

        // creating again does not reset
        SequenceRepo::create(&pool, &org.id, 1000).await.unwrap();
        assert_eq!(SequenceRepo::current(&pool, &org.id).await.unwrap(), Some(1002));
    }

    #[tokio::test]
    async fn test_sequence_missing_row() {
        let (_dir, pool) = test_pool().await;
        assert_eq!(SequenceRepo::increment(&pool, "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_user_lookup_is_case_insensitive() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;
        let invited = User::invited("Bob@Example.com", &org.id);
        UserRepo::insert(&pool, &invited).await.unwrap();

        let row = UserRepo::get_by_email(&pool, "BOB@example.COM").await.unwrap();
        assert_eq!(row.unwrap().id, invited.id);

        let dup = User::invited("bob@example.com", &org.id);
        let err = UserRepo::insert(&pool, &dup).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_user_activate_only_once() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;
        let invited = User::invited("bob@example.com", &org.id);
        UserRepo::insert(&pool, &invited).await.unwrap();

        let linked = UserRepo::activate(&pool, &invited.id, "ext-1", &org.id, Role::User, Some("Bob"))
            .await
            .unwrap();
        assert!(linked);
        let again = UserRepo::activate(&pool, &invited.id, "ext-2", &org.id, Role::User, None)
            .await
            .unwrap();
        assert!(!again);

        let row = UserRepo::get_by_external_id(&pool, "ext-1").await.unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("Bob"));
        assert_eq!(UserRepo::count_active(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_linked_user_requires_org() {
        let (_dir, pool) = test_pool().await;
        let principal = Principal::new("ext-9", "x@y.io");
        let user = User::founder(&principal, "missing-org");
        // foreign key on org_id rejects unknown organizations
        assert!(UserRepo::insert(&pool, &user).await.is_err());
    }

    #[tokio::test]
    async fn test_expense_settlement_cas() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;
        let exp = expense(&org.id, 1001, dec!(1000), dec!(400));
        ExpenseRepo::insert(&pool, &exp, 1001).await.unwrap();

        let next = exp.settle(dec!(100));
        let stale = ExpenseRepo::apply_settlement(&pool, &org.id, &exp.id, dec!(300), &next)
            .await
            .unwrap();
        assert!(!stale);

        let applied = ExpenseRepo::apply_settlement(&pool, &org.id, &exp.id, dec!(400), &next)
            .await
            .unwrap();
        assert!(applied);

        let row = ExpenseRepo::get_by_no(&pool, &org.id, "EX-1001").await.unwrap().unwrap();
        let stored = Expense::try_from(row).unwrap();
        assert_eq!(stored.paid_amount, dec!(500));
        assert_eq!(stored.balance_amount, dec!(500));
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_expense_scoped_by_org() {
        let (_dir, pool) = test_pool().await;
        let org_a = seed_org(&pool).await;
        let org_b = seed_org(&pool).await;
        let exp = Expense {
            id: "mine".into(),
            ..expense(&org_a.id, 1001, dec!(50), dec!(0))
        };
        ExpenseRepo::insert(&pool, &exp, 1001).await.unwrap();

        assert!(ExpenseRepo::get_by_no(&pool, &org_b.id, "EX-1001").await.unwrap().is_none());
        // the same number may exist in another organization
        let other = Expense {
            id: "other".into(),
            ..expense(&org_b.id, 1001, dec!(10), dec!(0))
        };
        ExpenseRepo::insert(&pool, &other, 1001).await.unwrap();
        // but not twice in one organization
        let dup = Expense {
            id: "dup".into(),
            ..expense(&org_a.id, 1001, dec!(10), dec!(0))
        };
        assert!(ExpenseRepo::insert(&pool, &dup, 1001).await.unwrap_err().is_unique_violation());
    }

    #[tokio::test]
    async fn test_list_orders_by_sequence() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;
        for no in [999, 1000, 1001] {
            ExpenseRepo::insert(&pool, &expense(&org.id, no, dec!(1), dec!(0)), no)
                .await
                .unwrap();
        }
        let rows = ExpenseRepo::list_by_org(&pool, &org.id, 2).await.unwrap();
        let numbers: Vec<_> = rows.iter().map(|r| r.expense_no.as_str()).collect();
        assert_eq!(numbers, vec!["EX-1001", "EX-1000"]);
    }

    #[tokio::test]
    async fn test_payment_insert_and_list() {
        let (_dir, pool) = test_pool().await;
        let org = seed_org(&pool).await;
        let exp = expense(&org.id, 1001, dec!(1000), dec!(0));
        ExpenseRepo::insert(&pool, &exp, 1001).await.unwrap();

        let p1 = Payment::new(&org.id, &exp.id, dec!(100), PaymentMode::Cash)
            .with_recorder(RecordedBy::from_raw("Ravi"));
        let p2 = Payment::new(&org.id, &exp.id, dec!(200), PaymentMode::Upi)
            .with_proof(Some("file:///p2.png".into()));
        PaymentRepo::insert(&pool, &p1).await.unwrap();
        PaymentRepo::insert(&pool, &p2).await.unwrap();

        let rows = PaymentRepo::list_by_expense(&pool, &org.id, &exp.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].recorded_by_name.as_deref(), Some("Ravi"));
        assert_eq!(rows[1].amount, "200.00");
        assert!(PaymentRepo::list_by_expense(&pool, "other-org", &exp.id)
            .await
            .unwrap()
            .is_empty());
    }
}
