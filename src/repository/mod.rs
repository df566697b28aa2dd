//! Repository layer for storage operations
//!
//! Each entity gets a store trait with a PostgreSQL implementation and an
//! in-memory one. Services only see `Arc<dyn ...Store>`, so the backend is a
//! startup decision.

pub mod books;
pub mod memory;
pub mod orders;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, BookFilter, Order, PageRequest, User},
};

/// Catalog store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get(&self, id: &str) -> AppResult<Option<Book>>;

    /// Books whose id is in `ids`, in no particular order; unknown ids are skipped
    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<Book>>;

    /// One sorted page plus the total number of matching books
    async fn find_page(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<(Vec<Book>, i64)>;

    async fn find_rented_by(&self, user_id: &str) -> AppResult<Vec<Book>>;

    /// Insert or replace by id
    async fn save(&self, book: &Book) -> AppResult<Book>;

    async fn delete(&self, id: &str) -> AppResult<()>;
}

/// Rental ledger store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: &str) -> AppResult<Option<Order>>;

    async fn find_all(&self) -> AppResult<Vec<Order>>;

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Order>>;

    async fn find_by_book(&self, book_id: &str) -> AppResult<Vec<Order>>;

    /// Insert or replace by id. Only the canonical snapshot is written.
    async fn save(&self, order: &Order) -> AppResult<Order>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    /// Returns the number of removed orders
    async fn delete_by_user(&self, user_id: &str) -> AppResult<u64>;
}

/// User store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> AppResult<Option<User>>;

    async fn find_all(&self) -> AppResult<Vec<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Vec<User>>;

    /// Insert or replace by id; a duplicate email is a conflict
    async fn save(&self, user: &User) -> AppResult<User>;

    async fn delete(&self, id: &str) -> AppResult<()>;
}

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub orders: Arc<dyn OrderStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    pub fn new(
        books: Arc<dyn BookStore>,
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            books,
            orders,
            users,
        }
    }

    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            orders: Arc::new(orders::OrdersRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Create an empty repository kept in process memory
    pub fn in_memory() -> Self {
        Self {
            books: Arc::new(memory::MemoryBookStore::default()),
            orders: Arc::new(memory::MemoryOrderStore::default()),
            users: Arc::new(memory::MemoryUserStore::default()),
        }
    }
}
