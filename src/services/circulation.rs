//! The loan state machine.
//!
//! Stored states: REQUESTED, APPROVED, RETURNED, REJECTED. Overdue is the
//! derived view `approved && due_date < now`, so no background writer has to
//! keep a stored status in step with the clock. Every transition goes through
//! the store's guarded update; this service sequences the calls and owns the
//! business rules around them.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, LimitKind},
    models::{
        BorrowRequest, Loan, LoanDetails, LoanFilter, LoanPatch, LoanStatus, NewLoan,
        ReturnRequest,
    },
    repository::CirculationStore,
    services::{fines, renewal},
};

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn CirculationStore>,
    /// Approve requests immediately instead of queueing for a librarian
    self_service: bool,
}

impl CirculationService {
    pub fn new(store: Arc<dyn CirculationStore>, self_service: bool) -> Self {
        Self {
            store,
            self_service,
        }
    }

    /// File a borrow request. No copy is reserved here: an unapproved request
    /// must not hold stock hostage. In self-service mode the request is
    /// approved in the same call.
    pub async fn request_borrow(&self, request: BorrowRequest) -> AppResult<Loan> {
        let now = Utc::now();
        let policy = self.store.active_policy(now).await?;

        // Surface an unknown book before creating any state
        self.store.get_book(request.book_id).await?;

        let open = self.store.count_open_loans(request.borrower_id).await?;
        if open >= policy.max_borrow_limit as i64 {
            return Err(AppError::LimitExceeded(
                LimitKind::Borrows,
                format!(
                    "Borrower {} already has {} open loans (limit {})",
                    request.borrower_id, open, policy.max_borrow_limit
                ),
            ));
        }

        if let Some(due) = request.desired_due_date {
            if due <= now {
                return Err(AppError::Validation(
                    "desired_due_date must be in the future".to_string(),
                ));
            }
        }

        let loan = self
            .store
            .insert_loan(&NewLoan {
                book_id: request.book_id,
                borrower_id: request.borrower_id,
                due_date: request.desired_due_date,
                max_renewals: policy.max_renewals,
            })
            .await?;
        tracing::info!(
            "Loan {} requested: borrower {} for book {}",
            loan.id,
            loan.borrower_id,
            loan.book_id
        );

        if self.self_service {
            return self.approve_borrow(loan.id, None).await;
        }
        Ok(loan)
    }

    /// Approve a pending request: reserve a copy and move the loan to
    /// APPROVED in one store transaction. An OutOfStock failure leaves the
    /// loan REQUESTED so it can be retried once copies come back, and a
    /// failure at any point leaves the inventory untouched.
    pub async fn approve_borrow(
        &self,
        loan_id: i32,
        due_date: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        let now = Utc::now();
        let loan = self.store.get_loan(loan_id).await?;
        if loan.status != LoanStatus::Requested {
            return Err(AppError::Conflict(format!(
                "Loan {} is {}, only requested loans can be approved",
                loan_id, loan.status
            )));
        }

        let policy = self.store.active_policy(now).await?;
        let due = due_date
            .or(loan.due_date)
            .unwrap_or_else(|| now + Duration::days(policy.default_loan_days as i64));

        let patch = LoanPatch {
            status: LoanStatus::Approved,
            borrowed_at: Some(now),
            due_date: Some(due),
            ..Default::default()
        };
        let approved = self
            .store
            .reserve_and_transition(loan_id, LoanStatus::Requested, &patch)
            .await?;
        tracing::info!("Loan {} approved, due {}", approved.id, due);
        Ok(approved)
    }

    /// Reject a pending request. Terminal; no inventory change.
    pub async fn reject_borrow(&self, loan_id: i32) -> AppResult<Loan> {
        let patch = LoanPatch {
            status: LoanStatus::Rejected,
            ..Default::default()
        };
        let rejected = self
            .store
            .transition_loan(loan_id, LoanStatus::Requested, None, &patch)
            .await?;
        tracing::info!("Loan {} rejected", loan_id);
        Ok(rejected)
    }

    /// Return a borrowed book. Valid from APPROVED (including the derived
    /// overdue view); the transition and the copy release commit together.
    /// The suggested fine and the recorded fine are both kept; an explicit
    /// override wins but never erases the suggestion.
    pub async fn return_book(&self, loan_id: i32, request: ReturnRequest) -> AppResult<Loan> {
        let now = Utc::now();
        let loan = self.store.get_loan(loan_id).await?;
        let policy = self.store.active_policy(now).await?;

        let suggested = loan
            .due_date
            .map(|due| fines::fine(due, now, policy.fine_per_day))
            .unwrap_or(Decimal::ZERO);
        let recorded = request.fine_override.unwrap_or(suggested);
        if recorded < Decimal::ZERO {
            return Err(AppError::Validation(
                "fine_override must not be negative".to_string(),
            ));
        }

        let patch = LoanPatch {
            status: LoanStatus::Returned,
            returned_at: Some(now),
            fine_amount: Some(recorded),
            suggested_fine: Some(suggested),
            return_condition: request.condition,
            return_notes: request.notes,
            ..Default::default()
        };
        let returned = self
            .store
            .transition_and_release(loan_id, LoanStatus::Approved, &patch)
            .await?;
        tracing::info!(
            "Loan {} returned, fine {} (suggested {})",
            loan_id,
            recorded,
            suggested
        );
        Ok(returned)
    }

    /// Extend the due date of an approved, not-yet-overdue loan. The renewal
    /// count is part of the transition guard, so concurrent renewals cannot
    /// both consume the same renewal.
    pub async fn extend_due_date(
        &self,
        loan_id: i32,
        new_due_date: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        let now = Utc::now();
        let loan = self.store.get_loan(loan_id).await?;
        renewal::can_renew(&loan, now)?;

        let policy = self.store.active_policy(now).await?;
        let due = new_due_date.unwrap_or_else(|| {
            loan.due_date.unwrap_or(now) + Duration::days(policy.default_loan_days as i64)
        });
        if due <= now {
            return Err(AppError::Validation(
                "new_due_date must be in the future".to_string(),
            ));
        }

        let patch = LoanPatch {
            status: LoanStatus::Approved,
            due_date: Some(due),
            renewal_count: Some(loan.renewal_count + 1),
            ..Default::default()
        };
        let renewed = self
            .store
            .transition_loan(loan_id, LoanStatus::Approved, Some(loan.renewal_count), &patch)
            .await?;
        tracing::info!(
            "Loan {} renewed ({}/{}), due {}",
            loan_id,
            renewed.renewal_count,
            renewed.max_renewals,
            due
        );
        Ok(renewed)
    }

    /// List loans matching the filter, with the derived overdue view attached
    pub async fn list_borrowed(&self, filter: LoanFilter) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let loans = self.store.list_loans(&filter, now).await?;
        Ok(loans
            .into_iter()
            .map(|loan| LoanDetails::from_loan(loan, now))
            .collect())
    }

    /// Read-only overdue query; never mutates state
    pub async fn list_overdue(&self) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let loans = self.store.list_overdue(now).await?;
        Ok(loans
            .into_iter()
            .map(|loan| LoanDetails::from_loan(loan, now))
            .collect())
    }

    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let loan = self.store.get_loan(loan_id).await?;
        Ok(LoanDetails::from_loan(loan, now))
    }
}
