//! Book (inventory) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book model from database.
///
/// `available_quantity` is derived state: it always equals `total_quantity`
/// minus the number of approved, unreturned loans for the book, and every
/// mutation of it goes through a conditional update (see `BooksRepository`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: Option<String>,
    pub total_quantity: i32,
    pub available_quantity: i32,
    /// Owning institution tag; institutions themselves are managed elsewhere
    pub institution_id: Option<Uuid>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewBook {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "isbn is required"))]
    pub isbn: String,
    pub category: Option<String>,
    #[validate(range(min = 0, message = "total_quantity must not be negative"))]
    pub total_quantity: i32,
    pub institution_id: Option<Uuid>,
}

/// Partial book update. Absent fields are left untouched; changing
/// `total_quantity` recomputes `available_quantity` against active loans.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub total_quantity: Option<i32>,
}
