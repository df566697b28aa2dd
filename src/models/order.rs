//! Order (rental ledger entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;

use super::book::Book;
use crate::error::{AppError, AppResult};

/// Rental lifecycle: active -> returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Active,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(OrderStatus::Active),
            "returned" => Ok(OrderStatus::Returned),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

/// Copy of a book's descriptive fields taken when the rental was created.
/// Never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub image: Option<String>,
}

impl From<&Book> for BookSnapshot {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year.clone(),
            image: book.image.clone(),
        }
    }
}

/// Response-only view of the rented book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisplayBook {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&BookSnapshot> for DisplayBook {
    fn from(snapshot: &BookSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            title: snapshot.title.clone(),
            author: snapshot.author.clone(),
            year: snapshot.year.clone(),
            image: snapshot.image.clone(),
        }
    }
}

/// Rental ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: Option<String>,
    pub book_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub rented_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub book_snapshot: Option<BookSnapshot>,
    /// Older records carry the snapshot under `book`; read, never written
    #[serde(rename = "book", default, skip_serializing)]
    pub legacy_book: Option<BookSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_book: Option<DisplayBook>,
}

impl Order {
    /// Canonical snapshot, falling back to the legacy field
    pub fn snapshot(&self) -> Option<&BookSnapshot> {
        self.book_snapshot.as_ref().or(self.legacy_book.as_ref())
    }

    pub fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    id: String,
    user_id: Option<String>,
    book_id: Option<String>,
    status: Option<String>,
    rented_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    book_snapshot: Option<Json<BookSnapshot>>,
    book: Option<Json<BookSnapshot>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            status: row.status.and_then(|s| s.parse().ok()),
            rented_at: row.rented_at,
            returned_at: row.returned_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            book_snapshot: row.book_snapshot.map(|Json(s)| s),
            legacy_book: row.book.map(|Json(s)| s),
            display_book: None,
        }
    }
}

/// Partial order update. Absent fields are left untouched, `null` clears.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub status: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub rented_at: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub returned_at: Option<Option<String>>,
}

impl OrderPatch {
    /// Apply recognized fields; invalid values reject the whole patch
    pub fn apply(self, order: &mut Order) -> AppResult<()> {
        let status = self
            .status
            .map(|value| value.map(|s| s.parse::<OrderStatus>()).transpose())
            .transpose()
            .map_err(AppError::Validation)?;
        let rented_at = self.rented_at.map(parse_timestamp).transpose()?;
        let returned_at = self.returned_at.map(parse_timestamp).transpose()?;

        if let Some(status) = status {
            order.status = status;
        }
        if let Some(rented_at) = rented_at {
            order.rented_at = rented_at;
        }
        if let Some(returned_at) = returned_at {
            order.returned_at = returned_at;
        }
        Ok(())
    }
}

fn parse_timestamp(value: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| AppError::Validation(format!("Invalid timestamp: {}", s)))
        })
        .transpose()
}
