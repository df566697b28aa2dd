//! Orders (rental ledger) repository for database operations

use async_trait::async_trait;
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::AppResult,
    models::order::{Order, OrderRow},
};

use super::OrderStore;

const ORDER_COLUMNS: &str = "id, user_id, book_id, status, rented_at, returned_at, \
     created_at, updated_at, book_snapshot, book";

#[derive(Clone)]
pub struct OrdersRepository {
    pool: Pool<Postgres>,
}

impl OrdersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str, value: Option<&str>) -> AppResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE {} ORDER BY created_at ASC NULLS FIRST, id ASC",
            ORDER_COLUMNS, condition
        );
        let mut query = sqlx::query_as::<_, OrderRow>(&sql);
        if let Some(value) = value {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

#[async_trait]
impl OrderStore for OrdersRepository {
    async fn get(&self, id: &str) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn find_all(&self) -> AppResult<Vec<Order>> {
        self.fetch_where("TRUE", None).await
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
        self.fetch_where("user_id = $1", Some(user_id)).await
    }

    async fn find_by_book(&self, book_id: &str) -> AppResult<Vec<Order>> {
        self.fetch_where("book_id = $1", Some(book_id)).await
    }

    async fn save(&self, order: &Order) -> AppResult<Order> {
        // The legacy `book` column is left as it is
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, user_id, book_id, status, rented_at, returned_at,
                                created_at, updated_at, book_snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                book_id = EXCLUDED.book_id,
                status = EXCLUDED.status,
                rented_at = EXCLUDED.rented_at,
                returned_at = EXCLUDED.returned_at,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at,
                book_snapshot = EXCLUDED.book_snapshot
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.book_id)
        .bind(order.status.map(|s| s.as_str()))
        .bind(order.rented_at)
        .bind(order.returned_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.book_snapshot.as_ref().map(Json))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM orders WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
