//! Borrower contact directory entry

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Minimal contact record consumed by the reminder dispatcher.
/// Identity and account management live outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BorrowerContact {
    pub id: i32,
    pub name: String,
    pub email: String,
}
