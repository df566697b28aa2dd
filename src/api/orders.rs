//! Rental (order) endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    error::{AppError, AppResult},
    models::{order::OrderPatch, Order},
    services::access::{Operation, RentalScope},
    AppState,
};

use super::{Caller, DataResponse, OrderData};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    /// Admins only; everybody else always gets their own rentals
    pub user_id: Option<String>,
    pub book_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateQuery {
    /// Used when the body names no book
    pub book_id: Option<String>,
}

/// Pull the book id out of the loose create payload
fn requested_book_id(body: &Value) -> Option<String> {
    for key in ["bookId", "book_id", "book", "idBook"] {
        if let Some(Value::String(id)) = body.get(key) {
            return Some(id.clone());
        }
    }
    match body.get("book") {
        Some(Value::Object(book)) => book.get("id").and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }),
        _ => None,
    }
}

/// List rentals visible to the caller
#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(OrderListQuery),
    responses(
        (status = 200, description = "Rentals with display book", body = Vec<Order>)
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let scope = state
        .services
        .access
        .scope_rentals(caller.identity(), query.user_id.as_deref());

    let orders = match scope {
        RentalScope::Nobody => Vec::new(),
        RentalScope::User(user_id) => {
            state
                .services
                .rentals
                .list(Some(&user_id), query.book_id.as_deref())
                .await?
        }
        RentalScope::All { user_id } => {
            state
                .services
                .rentals
                .list(user_id.as_deref(), query.book_id.as_deref())
                .await?
        }
    };

    Ok(Json(orders))
}

/// Get rental by ID
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Rental", body = Order),
        (status = 404, description = "Order not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::ViewRental)
        .into_result()?;

    let order = state.services.rentals.get(&id).await?;
    Ok(Json(order))
}

/// Rent a book for the caller
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(OrderCreateQuery),
    request_body(content = Object, description = "bookId (or book_id, book, idBook, book.id)"),
    responses(
        (status = 201, description = "Rental created", body = Order),
        (status = 400, description = "No book given or inferable", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrderCreateQuery>,
    body: Option<Json<Value>>,
) -> AppResult<(StatusCode, HeaderMap, Json<Order>)> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateRental)
        .into_result()?;

    let book_id = body
        .as_ref()
        .and_then(|Json(body)| requested_book_id(body))
        .filter(|id| !id.trim().is_empty())
        .or(query.book_id);

    let order = state
        .services
        .rentals
        .create(caller.user_id(), book_id.as_deref())
        .await?;

    let location = format!(
        "{}/orders/{}",
        state.config.server.base_path.trim_end_matches('/'),
        order.id
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&location)
            .map_err(|e| AppError::Internal(format!("Invalid location header: {}", e)))?,
    );

    Ok((StatusCode::CREATED, headers, Json(order)))
}

/// Edit status or timestamps of a rental
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Order ID")),
    request_body = OrderPatch,
    responses(
        (status = 200, description = "Rental updated", body = Order),
        (status = 400, description = "Invalid status or timestamp", body = crate::error::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(patch): Json<OrderPatch>,
) -> AppResult<Json<Order>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateRental)
        .into_result()?;

    let order = state.services.rentals.patch(&id, patch).await?;
    Ok(Json(order))
}

/// Return a rented book
#[utoipa::path(
    patch,
    path = "/orders/{id}/return",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Rental returned", body = OrderData),
        (status = 404, description = "Order not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<OrderData>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::MutateRental)
        .into_result()?;

    let order = state.services.rentals.return_order(&id).await?;
    Ok(Json(DataResponse::new(order)))
}

/// Delete a rental record
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Rental deleted")
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::DeleteRental)
        .into_result()?;

    state.services.rentals.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
