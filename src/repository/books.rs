//! Books repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::with_retry;
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookPatch, NewBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let pool = &self.pool;
        with_retry("books.get_by_id", || async move {
            sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
        })
        .await
    }

    /// List books, optionally scoped to one institution
    pub async fn list(&self, institution_id: Option<Uuid>) -> AppResult<Vec<Book>> {
        let pool = &self.pool;
        let institution_id = &institution_id;
        with_retry("books.list", || async move {
            let books = match institution_id {
                Some(inst) => {
                    sqlx::query_as::<_, Book>(
                        "SELECT * FROM books WHERE institution_id = $1 ORDER BY title, id",
                    )
                    .bind(inst)
                    .fetch_all(pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
                        .fetch_all(pool)
                        .await?
                }
            };
            Ok(books)
        })
        .await
    }

    /// Create a new book; a fresh book starts with every copy available
    pub async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let pool = &self.pool;
        with_retry("books.insert", || async move {
            let created = sqlx::query_as::<_, Book>(
                r#"
                INSERT INTO books (title, author, isbn, category, total_quantity, available_quantity, institution_id)
                VALUES ($1, $2, $3, $4, $5, $5, $6)
                RETURNING *
                "#,
            )
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.isbn)
            .bind(&book.category)
            .bind(book.total_quantity)
            .bind(book.institution_id)
            .fetch_one(pool)
            .await?;
            Ok(created)
        })
        .await
    }

    /// Partial update. Runs under a row lock: when `total_quantity` changes,
    /// `available_quantity` is recomputed against the active loan count so the
    /// inventory invariant survives the edit.
    pub async fn update(&self, id: i32, patch: &BookPatch) -> AppResult<Book> {
        let pool = &self.pool;
        with_retry("books.update", || async move {
            let mut tx = pool.begin().await?;

            let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

            let total = patch.total_quantity.unwrap_or(book.total_quantity);
            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'approved'",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if (total as i64) < active {
                return Err(AppError::Validation(format!(
                    "total_quantity {} is below the {} copies currently on loan",
                    total, active
                )));
            }
            let available = total - active as i32;

            let updated = sqlx::query_as::<_, Book>(
                r#"
                UPDATE books SET
                    title = COALESCE($2, title),
                    author = COALESCE($3, author),
                    isbn = COALESCE($4, isbn),
                    category = COALESCE($5, category),
                    total_quantity = $6,
                    available_quantity = $7
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.author)
            .bind(&patch.isbn)
            .bind(&patch.category)
            .bind(total)
            .bind(available)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(updated)
        })
        .await
    }

    /// Delete a book. The existence check for non-terminal loans is part of
    /// the DELETE statement itself, so the guard and the delete cannot race.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let pool = &self.pool;
        let rows = with_retry("books.delete", || async move {
            let result = sqlx::query(
                r#"
                DELETE FROM books
                WHERE id = $1
                  AND NOT EXISTS (
                      SELECT 1 FROM loans
                      WHERE book_id = $1 AND status IN ('requested', 'approved')
                  )
                "#,
            )
            .bind(id)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            // Either the book is unknown or a live loan blocked the delete
            self.get_by_id(id).await?;
            return Err(AppError::Conflict(format!(
                "Book {} has loans that are not returned or rejected",
                id
            )));
        }
        Ok(())
    }

}
