//! Rental coordinator
//!
//! Owns the order lifecycle and moves availability between a book and its
//! rental. Book and order writes are sequential, not atomic: the last caller
//! wins on `rented_by`.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{order::OrderPatch, Book, BookSnapshot, DisplayBook, Order, OrderStatus},
    repository::Repository,
};

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
}

/// Most recently updated book, falling back to the most recently created one
fn latest_held(held: &[Book]) -> Option<&Book> {
    held.iter()
        .filter(|b| b.updated_at.is_some())
        .max_by_key(|b| b.updated_at)
        .or_else(|| held.iter().max_by_key(|b| b.created_at))
}

impl RentalsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Rent a book for the caller. Without a book id, the book the caller
    /// most recently got marked on is used.
    pub async fn create(&self, caller_id: Option<&str>, book_id: Option<&str>) -> AppResult<Order> {
        let user_id = caller_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))?;

        let book_id = match book_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let held = self.repository.books.find_rented_by(user_id).await?;
                latest_held(&held)
                    .map(|b| b.id.clone())
                    .ok_or_else(|| {
                        AppError::Validation("Both user and book are required".to_string())
                    })?
            }
        };

        let mut book = self
            .repository
            .books
            .get(&book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

        if let Some(ref previous) = book.rented_by {
            if previous != user_id {
                tracing::warn!(
                    "Rental: book {} was marked for user {}, reassigning to {}",
                    book.id, previous, user_id
                );
            }
        }

        // Marker writes bump updated_at; held-book inference orders by it
        let now = Utc::now();
        book.rented_by = Some(user_id.to_string());
        book.updated_at = Some(now);
        book = self.repository.books.save(&book).await?;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id.to_string()),
            book_id: Some(book.id.clone()),
            status: Some(OrderStatus::Active),
            rented_at: Some(now),
            returned_at: None,
            created_at: Some(now),
            updated_at: Some(now),
            book_snapshot: Some(BookSnapshot::from(&book)),
            legacy_book: None,
            display_book: None,
        };

        let mut saved = self.repository.orders.save(&order).await.map_err(|e| {
            tracing::error!(
                "Rental: book {} is marked for user {} but the order could not be written: {}",
                book.id, user_id, e
            );
            e
        })?;

        tracing::info!("Rental: order {} created for user {} (book {})", saved.id, user_id, book.id);
        self.hydrate(&mut saved).await?;
        Ok(saved)
    }

    pub async fn get(&self, id: &str) -> AppResult<Order> {
        let mut order = self.find(id).await?;
        self.hydrate(&mut order).await?;
        Ok(order)
    }

    /// Mark an order returned and release its book. Calling it again keeps
    /// the first return time but still releases the book.
    pub async fn return_order(&self, id: &str) -> AppResult<Order> {
        let mut order = self.find(id).await?;

        if !order.is_returned() {
            let now = Utc::now();
            order.status = Some(OrderStatus::Returned);
            order.returned_at = Some(now);
            order.updated_at = Some(now);
            order = self.repository.orders.save(&order).await?;
            tracing::info!("Rental: order {} returned", order.id);
        }

        if let Some(ref book_id) = order.book_id {
            if let Some(mut book) = self.repository.books.get(book_id).await? {
                book.rented_by = None;
                book.updated_at = Some(Utc::now());
                self.repository.books.save(&book).await?;
            }
        }

        self.hydrate(&mut order).await?;
        Ok(order)
    }

    /// Field-level edit of the ledger entry; availability is not touched
    pub async fn patch(&self, id: &str, patch: OrderPatch) -> AppResult<Order> {
        let mut order = self.find(id).await?;
        patch.apply(&mut order)?;
        order.updated_at = Some(Utc::now());

        let mut saved = self.repository.orders.save(&order).await?;
        self.hydrate(&mut saved).await?;
        Ok(saved)
    }

    /// A user filter wins over a book filter; neither lists everything
    pub async fn list(&self, user_id: Option<&str>, book_id: Option<&str>) -> AppResult<Vec<Order>> {
        let user_id = user_id.map(str::trim).filter(|v| !v.is_empty());
        let book_id = book_id.map(str::trim).filter(|v| !v.is_empty());

        let mut orders = match (user_id, book_id) {
            (Some(user_id), _) => self.repository.orders.find_by_user(user_id).await?,
            (None, Some(book_id)) => self.repository.orders.find_by_book(book_id).await?,
            (None, None) => self.repository.orders.find_all().await?,
        };

        for order in orders.iter_mut() {
            self.hydrate(order).await?;
        }
        Ok(orders)
    }

    /// Remove the ledger entry only; the book keeps its marker
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.repository.orders.delete(id).await
    }

    async fn find(&self, id: &str) -> AppResult<Order> {
        self.repository
            .orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))
    }

    /// Fill the response-only book view from the stored snapshot, or from the
    /// live book for records that predate snapshots
    async fn hydrate(&self, order: &mut Order) -> AppResult<()> {
        if let Some(snapshot) = order.snapshot() {
            order.display_book = Some(DisplayBook::from(snapshot));
            return Ok(());
        }

        if let Some(ref book_id) = order.book_id {
            if let Some(book) = self.repository.books.get(book_id).await? {
                order.display_book = Some(DisplayBook::from(&BookSnapshot::from(&book)));
            }
        }
        Ok(())
    }
}
