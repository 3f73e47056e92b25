//! Loans repository for database operations

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::with_retry;
use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanFilter, LoanPatch, LoanStatus, NewLoan},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        let pool = &self.pool;
        with_retry("loans.get_by_id", || async move {
            sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
        })
        .await
    }

    /// Create a new loan in REQUESTED state. No copy is reserved at this
    /// point; reservation happens at approval.
    pub async fn insert(&self, loan: &NewLoan) -> AppResult<Loan> {
        let pool = &self.pool;
        with_retry("loans.insert", || async move {
            let created = sqlx::query_as::<_, Loan>(
                r#"
                INSERT INTO loans (book_id, borrower_id, status, due_date, renewal_count, max_renewals)
                VALUES ($1, $2, 'requested', $3, 0, $4)
                RETURNING *
                "#,
            )
            .bind(loan.book_id)
            .bind(loan.borrower_id)
            .bind(loan.due_date)
            .bind(loan.max_renewals)
            .fetch_one(pool)
            .await?;
            Ok(created)
        })
        .await
    }

    /// Count a borrower's non-terminal loans
    pub async fn count_open(&self, borrower_id: i32) -> AppResult<i64> {
        let pool = &self.pool;
        with_retry("loans.count_open", || async move {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM loans WHERE borrower_id = $1 AND status IN ('requested', 'approved')",
            )
            .bind(borrower_id)
            .fetch_one(pool)
            .await?;
            Ok(count)
        })
        .await
    }

    /// Guarded status transition. The expected-prior-state check is part of
    /// the UPDATE, so two concurrent transitions on the same loan produce
    /// exactly one success and one Conflict.
    pub async fn transition(
        &self,
        id: i32,
        expected: LoanStatus,
        expected_renewals: Option<i16>,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        let pool = &self.pool;
        let updated = with_retry("loans.transition", || async move {
            let row = apply_patch(pool, id, expected, expected_renewals, patch).await?;
            Ok(row)
        })
        .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => {
                let current = self.get_by_id(id).await?;
                Err(AppError::Conflict(format!(
                    "Loan {} is {}, expected {}",
                    id, current.status, expected
                )))
            }
        }
    }

    /// Reserve a copy of the loan's book and apply the guarded transition in
    /// one transaction. Either both commit or neither: a crash between the
    /// two statements cannot strand a reserved copy.
    pub async fn reserve_and_transition(
        &self,
        id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        let pool = &self.pool;
        with_retry("loans.reserve_and_transition", || async move {
            let mut tx = pool.begin().await?;

            let loan = lock_loan(&mut tx, id).await?;
            if loan.status != expected {
                return Err(AppError::Conflict(format!(
                    "Loan {} is {}, expected {}",
                    id, loan.status, expected
                )));
            }

            let reserved = sqlx::query(
                r#"
                UPDATE books
                SET available_quantity = available_quantity - 1
                WHERE id = $1 AND available_quantity > 0
                "#,
            )
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                // Distinguish an unknown book from exhausted stock
                let known: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
                        .bind(loan.book_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if known {
                    AppError::OutOfStock(format!("No available copies of book {}", loan.book_id))
                } else {
                    AppError::NotFound(format!("Book with id {} not found", loan.book_id))
                });
            }

            let updated = apply_patch(&mut *tx, id, expected, None, patch)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!("Loan {} is {}, expected {}", id, loan.status, expected))
                })?;

            tx.commit().await?;
            Ok(updated)
        })
        .await
    }

    /// Apply the guarded transition and hand a copy of the loan's book back,
    /// in one transaction. The increment is capped at `total_quantity`.
    pub async fn transition_and_release(
        &self,
        id: i32,
        expected: LoanStatus,
        patch: &LoanPatch,
    ) -> AppResult<Loan> {
        let pool = &self.pool;
        with_retry("loans.transition_and_release", || async move {
            let mut tx = pool.begin().await?;

            let loan = lock_loan(&mut tx, id).await?;
            if loan.status != expected {
                return Err(AppError::Conflict(format!(
                    "Loan {} is {}, expected {}",
                    id, loan.status, expected
                )));
            }

            let updated = apply_patch(&mut *tx, id, expected, None, patch)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!("Loan {} is {}, expected {}", id, loan.status, expected))
                })?;

            let released = sqlx::query(
                r#"
                UPDATE books
                SET available_quantity = LEAST(available_quantity + 1, total_quantity)
                WHERE id = $1
                "#,
            )
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;
            if released.rows_affected() == 0 {
                return Err(AppError::NotFound(format!(
                    "Book with id {} not found",
                    loan.book_id
                )));
            }

            tx.commit().await?;
            Ok(updated)
        })
        .await
    }

    /// List loans matching the filter
    pub async fn list(&self, filter: &LoanFilter, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let pool = &self.pool;
        with_retry("loans.list", || async move {
            let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM loans WHERE 1=1");
            if let Some(borrower_id) = filter.borrower_id {
                qb.push(" AND borrower_id = ").push_bind(borrower_id);
            }
            if let Some(book_id) = filter.book_id {
                qb.push(" AND book_id = ").push_bind(book_id);
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status);
            }
            if filter.overdue == Some(true) {
                qb.push(" AND status = 'approved' AND due_date < ").push_bind(now);
            }
            qb.push(" ORDER BY id");

            let loans = qb.build_query_as::<Loan>().fetch_all(pool).await?;
            Ok(loans)
        })
        .await
    }

    /// The derived overdue view: approved loans past their due date
    pub async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let pool = &self.pool;
        with_retry("loans.list_overdue", || async move {
            let loans = sqlx::query_as::<_, Loan>(
                "SELECT * FROM loans WHERE status = 'approved' AND due_date < $1 ORDER BY due_date",
            )
            .bind(now)
            .fetch_all(pool)
            .await?;
            Ok(loans)
        })
        .await
    }

    /// Claim the reminder dedup key for one loan and calendar day.
    /// Returns false when the key was already claimed today.
    pub async fn claim_reminder(&self, loan_id: i32, day: NaiveDate) -> AppResult<bool> {
        let pool = &self.pool;
        with_retry("loans.claim_reminder", || async move {
            let result = sqlx::query(
                "INSERT INTO reminder_log (loan_id, sent_on) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(loan_id)
            .bind(day)
            .execute(pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }
}

/// Lock one loan row for the duration of the surrounding transaction
async fn lock_loan(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: i32,
) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
}

/// The guarded transition UPDATE, shared by the plain and the combined
/// transactional operations. None means the guard did not match.
async fn apply_patch<'e, E>(
    executor: E,
    id: i32,
    expected: LoanStatus,
    expected_renewals: Option<i16>,
    patch: &LoanPatch,
) -> Result<Option<Loan>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Loan>(
        r#"
        UPDATE loans SET
            status = $3,
            borrowed_at = COALESCE($4, borrowed_at),
            due_date = COALESCE($5, due_date),
            returned_at = COALESCE($6, returned_at),
            renewal_count = COALESCE($7, renewal_count),
            fine_amount = COALESCE($8, fine_amount),
            suggested_fine = COALESCE($9, suggested_fine),
            return_condition = COALESCE($10, return_condition),
            return_notes = COALESCE($11, return_notes)
        WHERE id = $1
          AND status = $2
          AND ($12::smallint IS NULL OR renewal_count = $12)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(expected)
    .bind(patch.status)
    .bind(patch.borrowed_at)
    .bind(patch.due_date)
    .bind(patch.returned_at)
    .bind(patch.renewal_count)
    .bind(patch.fine_amount)
    .bind(patch.suggested_fine)
    .bind(patch.return_condition)
    .bind(&patch.return_notes)
    .bind(expected_renewals)
    .fetch_optional(executor)
    .await
}
