//! Repository layer for database operations.
//!
//! Business rules live in the services layer; this layer is transactional
//! CRUD with conditional updates. The `CirculationStore` trait is the seam
//! between the two, so the state machine can be tested against a mock or an
//! in-memory store instead of Postgres.

pub mod books;
pub mod borrowers;
pub mod loans;
pub mod policies;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookPatch, BorrowerContact, CirculationPolicy, Loan, LoanFilter, LoanPatch,
        LoanStatus, NewBook, NewLoan, NewPolicy,
    },
};

const MAX_ATTEMPTS: u32 = 3;

/// Serialization failures, deadlocks and pool exhaustion are worth a retry;
/// business errors and constraint violations are not.
fn is_transient(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::PoolTimedOut) => true,
        AppError::Database(sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// Run a store operation with bounded backoff on transient failures.
/// Transactions roll back on drop, so a retried attempt starts clean.
pub(crate) async fn with_retry<T, F, Fut>(op_name: &str, op: F) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut delay = Duration::from_millis(50);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    "{}: transient database error (attempt {}/{}): {}",
                    op_name,
                    attempt,
                    MAX_ATTEMPTS,
                    err
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Persistence contract of the circulation engine.
///
/// Every mutation is a conditional, transactional update: the store applies
/// the expected-prior-state check itself so concurrent callers resolve to
/// exactly one winner regardless of how many service instances run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CirculationStore: Send + Sync {
    // Books
    async fn insert_book(&self, book: &NewBook) -> AppResult<Book>;
    async fn get_book(&self, id: i32) -> AppResult<Book>;
    async fn list_books(&self, institution_id: Option<Uuid>) -> AppResult<Vec<Book>>;
    async fn update_book(&self, id: i32, patch: &BookPatch) -> AppResult<Book>;
    /// Fails with Conflict while any non-terminal loan references the book
    async fn delete_book(&self, id: i32) -> AppResult<()>;

    // Loans
    async fn insert_loan(&self, loan: &NewLoan) -> AppResult<Loan>;
    async fn get_loan(&self, id: i32) -> AppResult<Loan>;
    async fn count_open_loans(&self, borrower_id: i32) -> AppResult<i64>;
    /// Guarded transition: applies `patch` only while the loan is in
    /// `expected` state (and, when given, at `expected_renewals`); Conflict
    /// otherwise.
    async fn transition_loan(
        &self,
        id: i32,
        expected: LoanStatus,
        expected_renewals: Option<i16>,
        patch: &LoanPatch,
    ) -> AppResult<Loan>;
    /// Reserve a copy of the loan's book and apply the guarded transition in
    /// a single transaction: OutOfStock when no copy is available, Conflict
    /// when the loan is not in `expected` state, and in either case neither
    /// table changes.
    async fn reserve_and_transition(
        &self,
        loan_id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan>;
    /// Apply the guarded transition and hand a copy of the loan's book back,
    /// in a single transaction; the increment is capped at `total_quantity`
    async fn transition_and_release(
        &self,
        loan_id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan>;
    async fn list_loans(&self, filter: &LoanFilter, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;
    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;

    // Policy
    async fn active_policy(&self, at: DateTime<Utc>) -> AppResult<CirculationPolicy>;
    async fn insert_policy(&self, policy: &NewPolicy) -> AppResult<CirculationPolicy>;

    // Reminders
    /// Claim the `loan_id + day` dedup key; false when already claimed
    async fn claim_reminder(&self, loan_id: i32, day: NaiveDate) -> AppResult<bool>;
    async fn borrower_contact(&self, borrower_id: i32) -> AppResult<Option<BorrowerContact>>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub policies: policies::PoliciesRepository,
    pub borrowers: borrowers::BorrowersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            policies: policies::PoliciesRepository::new(pool.clone()),
            borrowers: borrowers::BorrowersRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl CirculationStore for Repository {
    async fn insert_book(&self, book: &NewBook) -> AppResult<Book> {
        self.books.insert(book).await
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    async fn list_books(&self, institution_id: Option<Uuid>) -> AppResult<Vec<Book>> {
        self.books.list(institution_id).await
    }

    async fn update_book(&self, id: i32, patch: &BookPatch) -> AppResult<Book> {
        self.books.update(id, patch).await
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.books.delete(id).await
    }

    async fn insert_loan(&self, loan: &NewLoan) -> AppResult<Loan> {
        self.loans.insert(loan).await
    }

    async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        self.loans.get_by_id(id).await
    }

    async fn count_open_loans(&self, borrower_id: i32) -> AppResult<i64> {
        self.loans.count_open(borrower_id).await
    }

    async fn transition_loan(
        &self,
        id: i32,
        expected: LoanStatus,
        expected_renewals: Option<i16>,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        self.loans.transition(id, expected, expected_renewals, patch).await
    }

    async fn reserve_and_transition(
        &self,
        loan_id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        self.loans.reserve_and_transition(loan_id, expected, patch).await
    }

    async fn transition_and_release(
        &self,
        loan_id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        self.loans.transition_and_release(loan_id, expected, patch).await
    }

    async fn list_loans(&self, filter: &LoanFilter, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        self.loans.list(filter, now).await
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        self.loans.list_overdue(now).await
    }

    async fn active_policy(&self, at: DateTime<Utc>) -> AppResult<CirculationPolicy> {
        self.policies.active_at(at).await
    }

    async fn insert_policy(&self, policy: &NewPolicy) -> AppResult<CirculationPolicy> {
        self.policies.insert(policy).await
    }

    async fn claim_reminder(&self, loan_id: i32, day: NaiveDate) -> AppResult<bool> {
        self.loans.claim_reminder(loan_id, day).await
    }

    async fn borrower_contact(&self, borrower_id: i32) -> AppResult<Option<BorrowerContact>> {
        self.borrowers.get_contact(borrower_id).await
    }
}
