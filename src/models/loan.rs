//! Loan (borrow transaction) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Stored loan status.
///
/// OVERDUE is deliberately not a stored status: it is the derived condition
/// `approved && due_date < now`, evaluated at read time so the stored status
/// and the due date can never disagree.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Requested,
    Approved,
    Returned,
    Rejected,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Approved => "approved",
            LoanStatus::Returned => "returned",
            LoanStatus::Rejected => "rejected",
        }
    }

    /// Terminal loans never change again and hold no copy
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Rejected)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition of the copy as recorded at return time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReturnCondition {
    Good,
    Damaged,
    Lost,
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub status: LoanStatus,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewal_count: i16,
    pub max_renewals: i16,
    /// Fine actually recorded at return (override or suggestion)
    pub fine_amount: Option<Decimal>,
    /// Fine the calculator suggested, kept for audit alongside any override
    pub suggested_fine: Option<Decimal>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
}

impl Loan {
    /// Derived overdue condition, never stored
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Approved && self.due_date.map(|d| d < now).unwrap_or(false)
    }
}

/// Loan with the derived overdue view, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub status: LoanStatus,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewal_count: i16,
    pub max_renewals: i16,
    pub fine_amount: Option<Decimal>,
    pub suggested_fine: Option<Decimal>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
    pub is_overdue: bool,
}

impl LoanDetails {
    pub fn from_loan(loan: Loan, now: DateTime<Utc>) -> Self {
        let is_overdue = loan.is_overdue(now);
        Self {
            id: loan.id,
            book_id: loan.book_id,
            borrower_id: loan.borrower_id,
            status: loan.status,
            borrowed_at: loan.borrowed_at,
            due_date: loan.due_date,
            returned_at: loan.returned_at,
            renewal_count: loan.renewal_count,
            max_renewals: loan.max_renewals,
            fine_amount: loan.fine_amount,
            suggested_fine: loan.suggested_fine,
            return_condition: loan.return_condition,
            return_notes: loan.return_notes,
            is_overdue,
        }
    }
}

/// Borrow request payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub borrower_id: i32,
    pub book_id: i32,
    /// Requested due date; the policy default applies when omitted
    pub desired_due_date: Option<DateTime<Utc>>,
}

/// Return payload. `fine_override` replaces the suggested fine when present;
/// both values are persisted.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub condition: Option<ReturnCondition>,
    pub notes: Option<String>,
    pub fine_override: Option<Decimal>,
}

/// New loan row, written in REQUESTED state
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub borrower_id: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub max_renewals: i16,
}

/// Fields applied by a guarded status transition
#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub status: LoanStatus,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewal_count: Option<i16>,
    pub fine_amount: Option<Decimal>,
    pub suggested_fine: Option<Decimal>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
}

/// Filters for listing loans
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LoanFilter {
    pub borrower_id: Option<i32>,
    pub book_id: Option<i32>,
    pub status: Option<LoanStatus>,
    /// Restrict to the derived overdue view
    pub overdue: Option<bool>,
}
