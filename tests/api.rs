//! API integration tests against the in-memory stores

mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;

use biblioteka_server::models::{BookSnapshot, Order, OrderStatus, Role};
use common::{base_time, book, TestApp};

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new(true);

    let health = app.get("/api/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");

    let ready = app.get("/api/ready", None).await;
    assert_eq!(ready.body["storage"], "memory");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new(true);

    let registered = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Ana", "email": "ana@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(registered.status, StatusCode::OK);
    assert_eq!(registered.body["data"]["role"], "user");
    assert!(registered.body["data"].get("password").is_none());

    let login = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "ana@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let token = login.body["data"]["token"].as_str().expect("No token").to_string();

    let me = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "ana@example.com");
    assert!(me.body["data"].get("token").is_none());

    let anonymous = app.get("/api/auth/me", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["code"], 2);

    let forged = app.get("/api/auth/me", Some("not.a.token")).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures_and_duplicate_registration() {
    let app = TestApp::new(true);
    app.seed_user("u1", Role::User).await;

    let missing = app
        .request(Method::POST, "/api/auth/login", None, Some(json!({"email": "u1@example.com"})))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let wrong = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "u1@example.com", "password": "nope"})),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    // Seeded accounts keep a legacy plaintext password
    let legacy = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "u1@example.com", "password": "plain-password"})),
        )
        .await;
    assert_eq!(legacy.status, StatusCode::OK);

    let duplicate = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Again", "email": "u1@example.com", "password": "x"})),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["error"], "Duplicate");
}

#[tokio::test]
async fn test_catalog_paging_headers() {
    let app = TestApp::new(true);
    app.seed_catalog(13).await;

    let first = app.get("/api/books", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body.as_array().unwrap().len(), 12);
    assert_eq!(first.body[0]["id"], "b01");
    assert_eq!(first.header("x-total-count"), Some("13"));
    assert_eq!(first.header("content-range"), Some("items 0-11/13"));
    let link = first.header("link").unwrap();
    assert!(!link.contains("rel=\"prev\""));
    assert!(link.contains("</api/books?sort=createdAt&order=asc&limit=12&page=2>; rel=\"next\""));

    let second = app.get("/api/books?page=2", None).await;
    assert_eq!(second.body.as_array().unwrap().len(), 1);
    assert_eq!(second.body[0]["id"], "b13");
    assert_eq!(second.header("content-range"), Some("items 12-12/13"));
    let link = second.header("link").unwrap();
    assert!(link.contains("rel=\"prev\""));
    assert!(!link.contains("rel=\"next\""));

    let descending = app.get("/api/books?_sort=createdAt&_order=DESC&_limit=2", None).await;
    let ids: Vec<_> = descending
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["b13", "b12"]);
}

#[tokio::test]
async fn test_catalog_text_search() {
    let app = TestApp::new(true);
    app.seed_book(book("b1", "Clean Code", "Robert C. Martin", "2008")).await;
    app.seed_book(book("b2", "The Pragmatic Programmer", "Hunt & Thomas", "1999")).await;

    let found = app.get("/api/books?q=clean", None).await;
    let books = found.body.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Clean Code");
    assert_eq!(found.header("x-total-count"), Some("1"));

    let by_year = app.get("/api/books?search=1999", None).await;
    assert_eq!(by_year.body[0]["id"], "b2");
}

#[tokio::test]
async fn test_catalog_batch_by_ids_keeps_request_order() {
    let app = TestApp::new(true);
    app.seed_catalog(4).await;

    let batch = app
        .get("/api/books?ids=b03,missing&favorites%5B%5D=b01&id=b03&page=9", None)
        .await;
    assert_eq!(batch.status, StatusCode::OK);
    let ids: Vec<_> = batch
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["b03", "b01"]);
    assert_eq!(batch.header("x-total-count"), Some("2"));
    assert_eq!(batch.header("content-range"), Some("items 0-1/2"));
    assert!(batch.header("link").is_none());
}

#[tokio::test]
async fn test_catalog_rejects_non_numeric_page() {
    let app = TestApp::new(true);
    let response = app.get("/api/books?page=abc", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "BadValue");
}

#[tokio::test]
async fn test_catalog_mutations_are_admin_only() {
    let app = TestApp::new(true);
    let member = app.seed_user("u1", Role::User).await;
    let admin = app.seed_user("admin", Role::Admin).await;
    let payload = json!({"title": "Refactoring", "author": "Martin Fowler", "rentedBy": "u1"});

    let anonymous = app
        .request(Method::POST, "/api/books", None, Some(payload.clone()))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = app
        .request(Method::POST, "/api/books", Some(&member), Some(payload.clone()))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let created = app
        .request(Method::POST, "/api/books", Some(&admin), Some(payload))
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let id = created.body["data"]["id"].as_str().unwrap().to_string();
    assert!(created.body["data"]["rentedBy"].is_null());
    assert!(created.body["data"]["createdAt"].is_string());

    let patched = app
        .request(
            Method::PATCH,
            &format!("/api/books/{}", id),
            Some(&admin),
            Some(json!({"year": "1999", "description": null})),
        )
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["data"]["year"], "1999");
    assert_eq!(patched.body["data"]["title"], "Refactoring");

    let deleted = app
        .request(Method::DELETE, &format!("/api/books/{}", id), Some(&admin), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("/api/books/{}", id), None).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_permissive_mode_skips_role_gates() {
    let app = TestApp::new(false);

    let created = app
        .request(Method::POST, "/api/books", None, Some(json!({"title": "Dev Book"})))
        .await;
    assert_eq!(created.status, StatusCode::OK);

    // Ownership still applies
    let member = app.seed_user("u1", Role::User).await;
    app.seed_user("u2", Role::User).await;
    let other = app
        .request(
            Method::PATCH,
            "/api/users/u2",
            Some(&member),
            Some(json!({"name": "Hijacked"})),
        )
        .await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);

    // The coordinator still needs a caller
    let anonymous_rental = app
        .request(Method::POST, "/api/orders", None, Some(json!({"bookId": "x"})))
        .await;
    assert_eq!(anonymous_rental.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rent_and_return_scenario() {
    let app = TestApp::new(true);
    app.seed_book(book("B1", "Clean Code", "Robert C. Martin", "2008")).await;
    let member = app.seed_user("U1", Role::User).await;

    let created = app
        .request(Method::POST, "/api/orders", Some(&member), Some(json!({"bookId": "B1"})))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let order_id = created.body["id"].as_str().unwrap().to_string();
    assert_eq!(created.header("location"), Some(format!("/api/orders/{}", order_id).as_str()));
    assert_eq!(created.body["status"], "active");
    assert_eq!(created.body["userId"], "U1");
    assert_eq!(created.body["bookSnapshot"]["title"], "Clean Code");
    assert_eq!(created.body["displayBook"]["title"], "Clean Code");
    assert_eq!(app.get_book("B1").await.rented_by.as_deref(), Some("U1"));

    let returned = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/return", order_id),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(returned.status, StatusCode::OK);
    assert_eq!(returned.body["data"]["status"], "returned");
    let returned_at = returned.body["data"]["returnedAt"].clone();
    assert!(returned_at.is_string());
    assert_eq!(app.get_book("B1").await.rented_by, None);

    let again = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/return", order_id),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(again.body["data"]["returnedAt"], returned_at);
    assert_eq!(again.body["data"]["status"], "returned");
}

#[tokio::test]
async fn test_rental_role_gate_and_missing_book() {
    let app = TestApp::new(true);
    let admin = app.seed_user("admin", Role::Admin).await;
    let member = app.seed_user("u1", Role::User).await;

    let by_admin = app
        .request(Method::POST, "/api/orders", Some(&admin), Some(json!({"bookId": "b1"})))
        .await;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

    let missing = app
        .request(Method::POST, "/api/orders?bookId=ghost", Some(&member), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let nothing_held = app
        .request(Method::POST, "/api/orders", Some(&member), Some(json!({})))
        .await;
    assert_eq!(nothing_held.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_listing_is_scoped() {
    let app = TestApp::new(true);
    app.seed_catalog(3).await;
    let alice = app.seed_user("alice", Role::User).await;
    let bob = app.seed_user("bob", Role::User).await;
    let admin = app.seed_user("admin", Role::Admin).await;

    for (token, book_id) in [(&alice, "b01"), (&alice, "b02"), (&bob, "b03")] {
        let created = app
            .request(Method::POST, "/api/orders", Some(token), Some(json!({"book": {"id": book_id}})))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
    }

    let own = app.get("/api/orders?userId=bob", Some(&alice)).await;
    let own = own.body.as_array().unwrap();
    assert_eq!(own.len(), 2);
    assert!(own.iter().all(|o| o["userId"] == "alice"));

    let anonymous = app.get("/api/orders", None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body, json!([]));

    let all = app.get("/api/orders", Some(&admin)).await;
    assert_eq!(all.body.as_array().unwrap().len(), 3);

    let filtered = app.get("/api/orders?userId=bob", Some(&admin)).await;
    assert_eq!(filtered.body.as_array().unwrap().len(), 1);

    let by_book = app.get("/api/orders?bookId=b02", Some(&admin)).await;
    assert_eq!(by_book.body[0]["bookId"], "b02");
}

#[tokio::test]
async fn test_legacy_orders_are_hydrated() {
    let app = TestApp::new(true);
    app.seed_book(book("b1", "Live Title", "Someone", "2001")).await;
    let admin = app.seed_user("admin", Role::Admin).await;

    let legacy = Order {
        id: "o-legacy".to_string(),
        user_id: Some("u1".to_string()),
        book_id: Some("b1".to_string()),
        status: Some(OrderStatus::Active),
        rented_at: Some(base_time()),
        returned_at: None,
        created_at: Some(base_time()),
        updated_at: Some(base_time()),
        book_snapshot: None,
        legacy_book: Some(BookSnapshot {
            id: "b1".to_string(),
            title: Some("Old Title".to_string()),
            author: None,
            year: None,
            image: None,
        }),
        display_book: None,
    };
    let mut bare = legacy.clone();
    bare.id = "o-bare".to_string();
    bare.legacy_book = None;
    bare.created_at = Some(base_time() + Duration::minutes(1));
    app.orders.insert_raw(legacy).await;
    app.orders.insert_raw(bare).await;

    let from_legacy = app.get("/api/orders/o-legacy", Some(&admin)).await;
    assert_eq!(from_legacy.body["displayBook"]["title"], "Old Title");
    assert!(from_legacy.body.get("book").is_none());
    assert!(from_legacy.body["bookSnapshot"].is_null());

    let from_live = app.get("/api/orders/o-bare", Some(&admin)).await;
    assert_eq!(from_live.body["displayBook"]["title"], "Live Title");

    let missing = app.get("/api/orders/nope", Some(&admin)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_patch_and_delete() {
    let app = TestApp::new(true);
    app.seed_book(book("b1", "Clean Code", "Robert C. Martin", "2008")).await;
    let member = app.seed_user("u1", Role::User).await;

    let created = app
        .request(Method::POST, "/api/orders", Some(&member), Some(json!({"bookId": "b1"})))
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{}", id);

    let bad = app
        .request(Method::PATCH, &uri, Some(&member), Some(json!({"returnedAt": "soon"})))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let patched = app
        .request(
            Method::PATCH,
            &uri,
            Some(&member),
            Some(json!({"status": "returned", "rentedAt": null, "color": "red"})),
        )
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["status"], "returned");
    assert!(patched.body["rentedAt"].is_null());
    // No availability logic on patch
    assert_eq!(app.get_book("b1").await.rented_by.as_deref(), Some("u1"));

    let deleted = app.request(Method::DELETE, &uri, Some(&member), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&member)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get_book("b1").await.rented_by.as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_user_updates_respect_ownership_and_roles() {
    let app = TestApp::new(true);
    let member = app.seed_user("u1", Role::User).await;
    let admin = app.seed_user("admin", Role::Admin).await;
    app.seed_user("u2", Role::User).await;

    let own = app
        .request(
            Method::PATCH,
            "/api/users/u1",
            Some(&member),
            Some(json!({"name": "Renamed", "favorites": ["b2", "b1", "b2"]})),
        )
        .await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["data"]["name"], "Renamed");
    assert_eq!(own.body["data"]["favorites"], json!(["b2", "b1"]));

    let other = app
        .request(Method::PATCH, "/api/users/u2", Some(&member), Some(json!({"name": "x"})))
        .await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);

    let promote_self = app
        .request(Method::PATCH, "/api/users/u1", Some(&member), Some(json!({"role": "admin"})))
        .await;
    assert_eq!(promote_self.status, StatusCode::FORBIDDEN);

    let promoted = app
        .request(Method::PATCH, "/api/users/u2", Some(&admin), Some(json!({"role": "admin"})))
        .await;
    assert_eq!(promoted.body["data"]["role"], "admin");

    let taken = app
        .request(
            Method::PATCH,
            "/api/users/u1",
            Some(&member),
            Some(json!({"email": "u2@example.com"})),
        )
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_user_create_and_query() {
    let app = TestApp::new(true);
    let member = app.seed_user("u1", Role::User).await;

    let created = app
        .request(
            Method::POST,
            "/api/users",
            None,
            Some(json!({"id": "new-user", "name": "New", "email": "new@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.header("location"), Some("/api/users/new-user"));
    assert!(created.body.get("password").is_none());

    let admin_signup = app
        .request(
            Method::POST,
            "/api/users",
            None,
            Some(json!({"name": "Sneaky", "email": "sneaky@example.com", "role": "admin"})),
        )
        .await;
    assert_eq!(admin_signup.status, StatusCode::UNAUTHORIZED);

    let matched = app
        .get("/api/users?email=new@example.com&password=secret", Some(&member))
        .await;
    assert_eq!(matched.body.as_array().unwrap().len(), 1);

    let unmatched = app
        .get("/api/users?email=new@example.com&password=wrong", Some(&member))
        .await;
    assert_eq!(unmatched.body, json!([]));

    assert_eq!(app.get("/api/users", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/api/users/new-user", Some(&member)).await.body["email"],
        "new@example.com"
    );
}

#[tokio::test]
async fn test_user_delete_cascades() {
    let app = TestApp::new(true);
    app.seed_catalog(2).await;
    let member = app.seed_user("u1", Role::User).await;
    let admin = app.seed_user("admin", Role::Admin).await;

    for book_id in ["b01", "b02"] {
        app.request(Method::POST, "/api/orders", Some(&member), Some(json!({"bookId": book_id})))
            .await;
    }

    let forbidden = app.request(Method::DELETE, "/api/users/u1", Some(&member), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let deleted = app.request(Method::DELETE, "/api/users/u1", Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let orders = app.get("/api/orders?userId=u1", Some(&admin)).await;
    assert_eq!(orders.body, json!([]));
    assert_eq!(app.get_book("b01").await.rented_by, None);
    assert_eq!(app.get_book("b02").await.rented_by, None);
    assert_eq!(
        app.get("/api/users/u1", Some(&admin)).await.status,
        StatusCode::NOT_FOUND
    );
}
