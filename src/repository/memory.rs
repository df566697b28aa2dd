//! In-process stores used for local runs and tests
//!
//! Filtering and ordering follow the PostgreSQL queries: ascending puts
//! missing values first, descending puts them last, ties break on id.

use std::cmp::Ordering;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookFilter, Order, PageRequest, SortDirection, SortField, User},
};

use super::{BookStore, OrderStore, UserStore};

#[derive(Default)]
pub struct MemoryBookStore {
    books: RwLock<IndexMap<String, Book>>,
}

fn sort_key(book: &Book, field: SortField) -> Option<String> {
    match field {
        SortField::Id => Some(book.id.clone()),
        SortField::Title => book.title.clone(),
        SortField::Author => book.author.clone(),
        SortField::Year => book.year.clone(),
        // RFC 3339 in UTC sorts lexically in time order
        SortField::CreatedAt => book.created_at.map(|t| t.to_rfc3339()),
        SortField::UpdatedAt => book.updated_at.map(|t| t.to_rfc3339()),
    }
}

fn compare_books(a: &Book, b: &Book, page: &PageRequest) -> Ordering {
    let (ka, kb) = (sort_key(a, page.sort), sort_key(b, page.sort));
    let primary = match (ka, kb, page.direction) {
        (None, None, _) => Ordering::Equal,
        (None, Some(_), SortDirection::Asc) => Ordering::Less,
        (Some(_), None, SortDirection::Asc) => Ordering::Greater,
        (None, Some(_), SortDirection::Desc) => Ordering::Greater,
        (Some(_), None, SortDirection::Desc) => Ordering::Less,
        (Some(x), Some(y), SortDirection::Asc) => x.cmp(&y),
        (Some(x), Some(y), SortDirection::Desc) => y.cmp(&x),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn get(&self, id: &str) -> AppResult<Option<Book>> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(ids.iter().filter_map(|id| books.get(id).cloned()).collect())
    }

    async fn find_page(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let books = self.books.read().await;
        let mut matching: Vec<&Book> = books
            .values()
            .filter(|book| match filter {
                BookFilter::All => true,
                BookFilter::RentedBy(user_id) => book.rented_by.as_deref() == Some(user_id.as_str()),
                BookFilter::Text(text) => book.matches_text(text),
            })
            .collect();
        matching.sort_by(|a, b| compare_books(a, b, page));

        let total = matching.len() as i64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(page.size).unwrap_or(0);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(size)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn find_rented_by(&self, user_id: &str) -> AppResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(books
            .values()
            .filter(|book| book.rented_by.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        self.books
            .write()
            .await
            .insert(book.id.clone(), book.clone());
        Ok(book.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.books.write().await.shift_remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<IndexMap<String, Order>>,
}

impl MemoryOrderStore {
    /// Seed a record as it would exist in storage, legacy fields included
    pub async fn insert_raw(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }

    async fn collect<F>(&self, keep: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders.values().filter(|o| keep(o)).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, id: &str) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<Order>> {
        Ok(self.collect(|_| true).await)
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
        Ok(self
            .collect(|o| o.user_id.as_deref() == Some(user_id))
            .await)
    }

    async fn find_by_book(&self, book_id: &str) -> AppResult<Vec<Order>> {
        Ok(self
            .collect(|o| o.book_id.as_deref() == Some(book_id))
            .await)
    }

    async fn save(&self, order: &Order) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        let mut stored = order.clone();
        stored.display_book = None;
        // Keep whatever legacy snapshot the stored record already had
        stored.legacy_book = orders.get(&order.id).and_then(|o| o.legacy_book.clone());
        orders.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.orders.write().await.shift_remove(id);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> AppResult<u64> {
        let mut orders = self.orders.write().await;
        let before = orders.len();
        orders.retain(|_, o| o.user_id.as_deref() != Some(user_id));
        Ok((before - orders.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<IndexMap<String, User>>,
}

impl MemoryUserStore {
    /// Seed a record as it would exist in storage, bypassing write rules
    pub async fn insert_raw(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect())
    }

    async fn save(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.email == user.email && existing.id != user.id)
        {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.users.write().await.shift_remove(id);
        Ok(())
    }
}
