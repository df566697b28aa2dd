//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookPatch, CreateBook},
        Book,
    },
    services::{access::Operation, catalog::{CatalogParams, PageMeta}},
    AppState,
};

use super::{BookData, Caller, DataResponse, X_TOTAL_COUNT};

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AppError::Internal(format!("Invalid header value: {}", e)))
}

fn listing_headers(meta: &PageMeta) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(X_TOTAL_COUNT, HeaderValue::from(meta.total));
    headers.insert(header::CONTENT_RANGE, header_value(&meta.content_range)?);
    if let Some(ref links) = meta.links {
        headers.insert(header::LINK, header_value(&links.header_value())?);
    }
    Ok(headers)
}

/// List books: batch by ids, or a filtered and sorted page
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("q" = Option<String>, Query, description = "Case-insensitive text in title, author or year (alias: search)"),
        ("rentedBy" = Option<String>, Query, description = "Only books held by this user; wins over q"),
        ("page" = Option<i64>, Query, description = "1-based page (alias: _page)"),
        ("limit" = Option<i64>, Query, description = "Page size, default 12 (alias: _limit)"),
        ("sort" = Option<String>, Query, description = "Sort field, default createdAt (alias: _sort)"),
        ("order" = Option<String>, Query, description = "asc or desc (alias: _order)"),
        ("ids" = Option<String>, Query, description = "Comma-separated ids; also id, id[], ids[], favorites, favorites[]")
    ),
    responses(
        (status = 200, description = "Books; X-Total-Count, Content-Range and Link headers carry paging", body = Vec<Book>),
        (status = 400, description = "Non-numeric page or limit", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<(HeaderMap, Json<Vec<Book>>)> {
    let params = CatalogParams::from_pairs(pairs);
    let result = state.services.catalog.resolve(&params).await?;
    let headers = listing_headers(&result.meta)?;
    Ok((headers, Json(result.books)))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book", body = BookData),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BookData>> {
    let book = state.services.catalog.get_book(&id).await?;
    Ok(Json(DataResponse::new(book)))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 200, description = "Book created", body = BookData),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    caller: Caller,
    Json(book): Json<CreateBook>,
) -> AppResult<Json<BookData>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateCatalog)
        .into_result()?;

    let created = state.services.catalog.create_book(book).await?;
    Ok(Json(DataResponse::new(created)))
}

/// Update descriptive fields of a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    request_body = BookPatch,
    responses(
        (status = 200, description = "Book updated", body = BookData),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(patch): Json<BookPatch>,
) -> AppResult<Json<BookData>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateCatalog)
        .into_result()?;

    let updated = state.services.catalog.update_book(&id, patch).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateCatalog)
        .into_result()?;

    state.services.catalog.delete_book(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
