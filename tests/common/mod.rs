//! Shared helpers: an in-memory application driven through the router

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use biblioteka_server::{
    api,
    config::{AppConfig, StorageBackend},
    models::{Book, Role, User},
    repository::{
        memory::{MemoryBookStore, MemoryOrderStore, MemoryUserStore},
        BookStore, Repository,
    },
    AppState,
};

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub books: Arc<MemoryBookStore>,
    pub orders: Arc<MemoryOrderStore>,
    pub users: Arc<MemoryUserStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn book(id: &str, title: &str, author: &str, year: &str) -> Book {
    Book {
        id: id.to_string(),
        title: Some(title.to_string()),
        author: Some(author.to_string()),
        year: Some(year.to_string()),
        image: None,
        description: None,
        rented_by: None,
        created_at: Some(base_time()),
        updated_at: None,
    }
}

impl TestApp {
    pub fn new(security_enabled: bool) -> Self {
        let mut config = AppConfig::default();
        config.security.enabled = security_enabled;
        config.storage.backend = StorageBackend::Memory;
        config.auth.jwt_secret = "integration-test-secret".to_string();

        let books = Arc::new(MemoryBookStore::default());
        let orders = Arc::new(MemoryOrderStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let repository = Repository::new(books.clone(), orders.clone(), users.clone());

        let state = AppState::new(config, repository);
        let router = api::create_router(state.clone());

        Self {
            state,
            router,
            books,
            orders,
            users,
        }
    }

    pub async fn seed_book(&self, book: Book) {
        self.books.save(&book).await.expect("Failed to seed book");
    }

    /// Seed `count` books created one minute apart, ids `b01`, `b02`, ...
    pub async fn seed_catalog(&self, count: usize) {
        for i in 1..=count {
            let mut b = book(&format!("b{:02}", i), &format!("Book {}", i), "Author", "2000");
            b.created_at = Some(base_time() + Duration::minutes(i as i64));
            self.seed_book(b).await;
        }
    }

    pub async fn get_book(&self, id: &str) -> Book {
        self.books
            .get(id)
            .await
            .expect("Store failure")
            .expect("Book not found")
    }

    /// Seed a user and return a bearer token for them
    pub async fn seed_user(&self, id: &str, role: Role) -> String {
        let user = User {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            password: Some("plain-password".to_string()),
            role,
            favorites: Vec::new(),
        };
        self.users.insert_raw(user.clone()).await;
        self.state
            .services
            .auth
            .issue_token(&user)
            .expect("Failed to issue token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Body is not JSON")
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }
}
