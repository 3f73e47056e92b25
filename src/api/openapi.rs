//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, policies};
use crate::error::ErrorResponse;
use crate::models::{
    Book, BookPatch, BorrowRequest, CirculationPolicy, LoanDetails, LoanStatus, NewBook,
    NewPolicy, ReturnCondition, ReturnRequest,
};
use crate::services::reminders::ReminderOutcome;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circula API",
        version = "1.0.0",
        description = "Library Circulation Engine REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Loans
        loans::list_loans,
        loans::list_overdue,
        loans::get_loan,
        loans::request_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::return_loan,
        loans::renew_loan,
        loans::remind_loan,
        // Policy
        policies::get_policy,
        policies::publish_policy,
    ),
    components(schemas(
        health::HealthResponse,
        ErrorResponse,
        Book,
        NewBook,
        BookPatch,
        LoanDetails,
        LoanStatus,
        ReturnCondition,
        BorrowRequest,
        ReturnRequest,
        loans::ApproveRequest,
        loans::RenewRequest,
        loans::ReminderResponse,
        ReminderOutcome,
        CirculationPolicy,
        NewPolicy,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "books", description = "Book inventory"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "policy", description = "Circulation policy")
    )
)]
pub struct ApiDoc;

/// Create the Swagger UI router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
