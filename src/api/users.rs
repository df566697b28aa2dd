//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, UserPatch, UserQuery},
        Role, User,
    },
    services::access::Operation,
    AppState,
};

use super::{Caller, DataResponse, UserData};

/// List users, optionally by email (and password)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Matching users", body = Vec<User>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<User>>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::ListUsers)
        .into_result()?;

    let users = state.services.users.query(&query).await?;
    Ok(Json(users))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::ViewUser)
        .into_result()?;

    let user = state.services.users.get_by_id(&id).await?;
    Ok(Json(user))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Only administrators may assign roles", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, HeaderMap, Json<User>)> {
    if user.role.is_some_and(|role| role != Role::User) {
        state
            .services
            .access
            .decide(caller.identity(), Operation::AssignRole)
            .into_result()?;
    }

    let created = state.services.users.create_user(user).await?;

    let location = format!(
        "{}/users/{}",
        state.config.server.base_path.trim_end_matches('/'),
        created.id
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&location)
            .map_err(|e| AppError::Internal(format!("Invalid location header: {}", e)))?,
    );

    Ok((StatusCode::CREATED, headers, Json(created)))
}

/// Update a user (self or admin)
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User ID")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserData),
        (status = 403, description = "Not the same user and not an administrator", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<UserData>> {
    let access = &state.services.access;
    access
        .decide(caller.identity(), Operation::MutateUser { target_id: &id })
        .into_result()?;
    if patch.role.is_some() {
        access
            .decide(caller.identity(), Operation::AssignRole)
            .into_result()?;
    }

    let updated = state.services.users.update_user(&id, patch).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// Delete a user with their rentals
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::DeleteUser)
        .into_result()?;

    state.services.users.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
