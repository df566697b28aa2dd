//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, BookFilter, PageRequest, SortDirection},
};

use super::BookStore;

const BOOK_COLUMNS: &str =
    "id, title, author, year, image, description, rented_by, created_at, updated_at";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards so user text is matched literally
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn get(&self, id: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = ANY($1)",
            BOOK_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn find_page(&self, filter: &BookFilter, page: &PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let (condition, param) = match filter {
            BookFilter::All => ("TRUE", None),
            BookFilter::RentedBy(user_id) => ("rented_by = $1", Some(user_id.clone())),
            BookFilter::Text(text) => (
                "(title ILIKE $1 OR author ILIKE $1 OR year ILIKE $1)",
                Some(like_pattern(text)),
            ),
        };

        let direction = match page.direction {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        };

        // Sort column comes from a closed enum, never from user text
        let (limit_idx, offset_idx) = if param.is_some() { (2, 3) } else { (1, 2) };
        let select = format!(
            "SELECT {} FROM books WHERE {} ORDER BY {} {}, id ASC LIMIT ${} OFFSET ${}",
            BOOK_COLUMNS,
            condition,
            page.sort.column(),
            direction,
            limit_idx,
            offset_idx
        );
        let count = format!("SELECT COUNT(*) FROM books WHERE {}", condition);

        let mut select_query = sqlx::query_as::<_, Book>(&select);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count);
        if let Some(ref value) = param {
            select_query = select_query.bind(value);
            count_query = count_query.bind(value);
        }

        let books = select_query
            .bind(page.size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let total = count_query.fetch_one(&self.pool).await?;

        Ok((books, total))
    }

    async fn find_rented_by(&self, user_id: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE rented_by = $1",
            BOOK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        let saved = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (id, title, author, year, image, description, rented_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                author = EXCLUDED.author,
                year = EXCLUDED.year,
                image = EXCLUDED.image,
                description = EXCLUDED.description,
                rented_by = EXCLUDED.rented_by,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.year)
        .bind(&book.image)
        .bind(&book.description)
        .bind(&book.rented_by)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
