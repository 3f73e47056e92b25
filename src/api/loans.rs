//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{BorrowRequest, LoanDetails, LoanFilter, ReturnRequest},
    services::reminders::ReminderOutcome,
};

use super::AuthenticatedUser;

/// Approval payload
#[derive(Deserialize, ToSchema)]
pub struct ApproveRequest {
    /// Due date; the policy default applies when omitted
    pub due_date: Option<DateTime<Utc>>,
}

/// Renewal payload
#[derive(Deserialize, ToSchema)]
pub struct RenewRequest {
    /// New due date; extends by the policy default when omitted
    pub new_due_date: Option<DateTime<Utc>>,
}

/// Reminder response
#[derive(Serialize, ToSchema)]
pub struct ReminderResponse {
    pub outcome: ReminderOutcome,
}

/// List loans matching a filter
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanFilter),
    responses(
        (status = 200, description = "Matching loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut filter): Query<LoanFilter>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    // Borrowers only see their own loans
    if !claims.is_librarian() {
        filter.borrower_id = Some(claims.borrower_id);
    }
    let loans = state.services.circulation.list_borrowed(filter).await?;
    Ok(Json(loans))
}

/// The derived overdue view
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Approved loans past their due date", body = Vec<LoanDetails>)
    )
)]
pub async fn list_overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_librarian()?;

    let loans = state.services.circulation.list_overdue().await?;
    Ok(Json(loans))
}

/// Get a loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.get_loan(loan_id).await?;
    claims.require_self_or_librarian(loan.borrower_id)?;
    Ok(Json(loan))
}

/// Request to borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Borrow request created", body = LoanDetails),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Borrower at max concurrent loans")
    )
)]
pub async fn request_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    claims.require_self_or_librarian(request.borrower_id)?;

    let loan = state.services.circulation.request_borrow(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoanDetails::from_loan(loan, Utc::now())),
    ))
}

/// Approve a borrow request (reserves a copy)
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Loan approved", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already processed or no copies available")
    )
)]
pub async fn approve_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<ApproveRequest>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_librarian()?;

    let loan = state
        .services
        .circulation
        .approve_borrow(loan_id, request.due_date)
        .await?;
    Ok(Json(LoanDetails::from_loan(loan, Utc::now())))
}

/// Reject a borrow request
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan rejected", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already processed")
    )
)]
pub async fn reject_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_librarian()?;

    let loan = state.services.circulation.reject_borrow(loan_id).await?;
    Ok(Json(LoanDetails::from_loan(loan, Utc::now())))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_librarian()?;

    let loan = state
        .services
        .circulation
        .return_book(loan_id, request)
        .await?;
    Ok(Json(LoanDetails::from_loan(loan, Utc::now())))
}

/// Renew a loan (extend its due date)
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Not approved or already overdue"),
        (status = 422, description = "Renewal cap reached")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<RenewRequest>,
) -> AppResult<Json<LoanDetails>> {
    let current = state.services.circulation.get_loan(loan_id).await?;
    claims.require_self_or_librarian(current.borrower_id)?;

    let loan = state
        .services
        .circulation
        .extend_due_date(loan_id, request.new_due_date)
        .await?;
    Ok(Json(LoanDetails::from_loan(loan, Utc::now())))
}

/// Send a reminder for a loan. Never mutates loan state.
#[utoipa::path(
    post,
    path = "/loans/{id}/remind",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Reminder attempted", body = ReminderResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not approved")
    )
)]
pub async fn remind_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ReminderResponse>> {
    claims.require_librarian()?;

    let outcome = state.services.reminders.send_reminder(loan_id).await?;
    Ok(Json(ReminderResponse { outcome }))
}
