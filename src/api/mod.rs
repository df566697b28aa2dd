//! HTTP API: request identity, routing and handlers

pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;
pub mod orders;
pub mod users;

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    config::CorsConfig,
    models::{
        user::{Profile, User},
        Book, Identity, Order,
    },
    AppState,
};

pub const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Optional caller identity taken from the `Authorization: Bearer` header.
///
/// Missing, malformed, expired or badly signed tokens all give `Caller(None)`;
/// deciding whether that is acceptable is up to the access policy.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|identity| identity.user_id.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .and_then(|auth| state.services.auth.verify(auth.token()));
        Ok(Caller(identity))
    }
}

/// `{"data": ...}` envelope used by several endpoints
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    BookData = DataResponse<Book>,
    OrderData = DataResponse<Order>,
    ProfileData = DataResponse<Profile>,
    UserData = DataResponse<User>
)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            X_TOTAL_COUNT,
            header::CONTENT_RANGE,
            header::LINK,
            header::LOCATION,
        ])
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);
    let base_path = state.config.server.base_path.trim_end_matches('/').to_string();

    let routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        // Rentals
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order)
                .patch(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id/return", patch(orders::return_order))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .with_state(state);

    let api = if base_path.is_empty() {
        routes
    } else {
        Router::new().nest(&base_path, routes)
    };

    api.merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
