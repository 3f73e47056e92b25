//! Renewal eligibility rules.
//!
//! Renewal is only open to approved loans that are not yet overdue and still
//! under their renewal cap. An overdue loan must come back to the desk; the
//! due date cannot be pushed out after the fact.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult, LimitKind},
    models::{Loan, LoanStatus},
};

/// Check whether `loan` may be renewed at `now`
pub fn can_renew(loan: &Loan, now: DateTime<Utc>) -> AppResult<()> {
    if loan.status != LoanStatus::Approved {
        return Err(AppError::Conflict(format!(
            "Loan {} is {}, only approved loans can be renewed",
            loan.id, loan.status
        )));
    }
    if loan.is_overdue(now) {
        return Err(AppError::Conflict(format!(
            "Loan {} is overdue and can no longer be renewed",
            loan.id
        )));
    }
    if loan.renewal_count >= loan.max_renewals {
        return Err(AppError::LimitExceeded(
            LimitKind::Renewals,
            format!("Loan {} has used all {} renewals", loan.id, loan.max_renewals),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn approved_loan(renewal_count: i16, max_renewals: i16, due_in_days: i64) -> Loan {
        let now = Utc::now();
        Loan {
            id: 1,
            book_id: 1,
            borrower_id: 1,
            status: LoanStatus::Approved,
            borrowed_at: Some(now - Duration::days(7)),
            due_date: Some(now + Duration::days(due_in_days)),
            returned_at: None,
            renewal_count,
            max_renewals,
            fine_amount: None,
            suggested_fine: None,
            return_condition: None,
            return_notes: None,
        }
    }

    #[test]
    fn approved_loan_under_cap_is_renewable() {
        let loan = approved_loan(0, 2, 3);
        assert!(can_renew(&loan, Utc::now()).is_ok());
    }

    #[test]
    fn loan_at_cap_is_rejected_with_limit_error() {
        let loan = approved_loan(2, 2, 3);
        assert!(matches!(
            can_renew(&loan, Utc::now()),
            Err(AppError::LimitExceeded(LimitKind::Renewals, _))
        ));
    }

    #[test]
    fn overdue_loan_is_rejected() {
        let loan = approved_loan(0, 2, -1);
        assert!(matches!(
            can_renew(&loan, Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn requested_loan_is_rejected() {
        let mut loan = approved_loan(0, 2, 3);
        loan.status = LoanStatus::Requested;
        assert!(matches!(
            can_renew(&loan, Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn returned_loan_is_rejected() {
        let mut loan = approved_loan(0, 2, 3);
        loan.status = LoanStatus::Returned;
        assert!(matches!(
            can_renew(&loan, Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }
}
