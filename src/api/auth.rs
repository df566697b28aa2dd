//! Authentication endpoints

use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    models::user::{LoginRequest, RegisterRequest},
    services::access::Operation,
    AppState,
};

use super::{Caller, DataResponse, ProfileData};

/// Login with email (or username) and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Profile with a bearer token", body = ProfileData),
        (status = 400, description = "Email or password missing", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<ProfileData>> {
    let profile = state.services.auth.login(request).await?;
    Ok(Json(DataResponse::new(profile)))
}

/// Register a member account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Profile with a bearer token", body = ProfileData),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<ProfileData>> {
    let profile = state.services.auth.register(request).await?;
    Ok(Json(DataResponse::new(profile)))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = ProfileData),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ProfileData>> {
    state
        .services
        .access
        .decide(caller.identity(), Operation::ViewOwnProfile)
        .into_result()?;

    let Some(identity) = caller.identity() else {
        return Err(AppError::Authentication("Unauthorized".to_string()));
    };
    let profile = state.services.auth.me(identity).await?;
    Ok(Json(DataResponse::new(profile)))
}
