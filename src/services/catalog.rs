//! Book catalog service

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookPatch, NewBook},
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CirculationStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CirculationStore>) -> Self {
        Self { store }
    }

    /// Add a book to the inventory; every copy starts available
    pub async fn add_book(&self, book: NewBook) -> AppResult<Book> {
        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let created = self.store.insert_book(&book).await?;
        tracing::info!(
            "Added book {} ({} copies): {}",
            created.id,
            created.total_quantity,
            created.title
        );
        Ok(created)
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.store.get_book(id).await
    }

    pub async fn list_books(&self, institution_id: Option<Uuid>) -> AppResult<Vec<Book>> {
        self.store.list_books(institution_id).await
    }

    /// Apply a partial update; the store recomputes availability when the
    /// copy count changes.
    pub async fn update_book(&self, id: i32, patch: BookPatch) -> AppResult<Book> {
        if let Some(total) = patch.total_quantity {
            if total < 0 {
                return Err(AppError::Validation(
                    "total_quantity must not be negative".to_string(),
                ));
            }
        }
        if matches!(&patch.title, Some(t) if t.is_empty())
            || matches!(&patch.author, Some(a) if a.is_empty())
            || matches!(&patch.isbn, Some(i) if i.is_empty())
        {
            return Err(AppError::Validation(
                "title, author and isbn must not be empty".to_string(),
            ));
        }
        self.store.update_book(id, &patch).await
    }

    /// Remove a book; blocked while any of its loans is still live
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.store.delete_book(id).await?;
        tracing::info!("Deleted book {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockCirculationStore;

    fn new_book() -> NewBook {
        NewBook {
            title: "The Name of the Rose".to_string(),
            author: "Umberto Eco".to_string(),
            isbn: "978-0156001311".to_string(),
            category: Some("fiction".to_string()),
            total_quantity: 3,
            institution_id: None,
        }
    }

    #[tokio::test]
    async fn add_book_rejects_missing_title() {
        let store = MockCirculationStore::new();
        let service = CatalogService::new(Arc::new(store));

        let mut book = new_book();
        book.title = String::new();

        let err = service.add_book(book).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn add_book_rejects_negative_quantity() {
        let store = MockCirculationStore::new();
        let service = CatalogService::new(Arc::new(store));

        let mut book = new_book();
        book.total_quantity = -1;

        let err = service.add_book(book).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn add_book_passes_valid_input_to_store() {
        let mut store = MockCirculationStore::new();
        store.expect_insert_book().times(1).returning(|book| {
            Ok(Book {
                id: 7,
                title: book.title.clone(),
                author: book.author.clone(),
                isbn: book.isbn.clone(),
                category: book.category.clone(),
                total_quantity: book.total_quantity,
                available_quantity: book.total_quantity,
                institution_id: book.institution_id,
            })
        });
        let service = CatalogService::new(Arc::new(store));

        let created = service.add_book(new_book()).await.unwrap();
        assert_eq!(created.id, 7);
        assert_eq!(created.available_quantity, created.total_quantity);
    }

    #[tokio::test]
    async fn update_book_rejects_empty_isbn() {
        let store = MockCirculationStore::new();
        let service = CatalogService::new(Arc::new(store));

        let patch = BookPatch {
            isbn: Some(String::new()),
            ..Default::default()
        };
        let err = service.update_book(1, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
