//! Borrower contact directory repository

use sqlx::{Pool, Postgres};

use super::with_retry;
use crate::{error::AppResult, models::BorrowerContact};

#[derive(Clone)]
pub struct BorrowersRepository {
    pool: Pool<Postgres>,
}

impl BorrowersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Contact record for reminder delivery; None when the borrower has no
    /// entry in the directory.
    pub async fn get_contact(&self, borrower_id: i32) -> AppResult<Option<BorrowerContact>> {
        let pool = &self.pool;
        with_retry("borrowers.get_contact", || async move {
            let contact = sqlx::query_as::<_, BorrowerContact>(
                "SELECT id, name, email FROM borrowers WHERE id = $1",
            )
            .bind(borrower_id)
            .fetch_optional(pool)
            .await?;
            Ok(contact)
        })
        .await
    }
}
