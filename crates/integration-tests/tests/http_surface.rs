//! Routing, authentication, role checks and middleware, exercised without a
//! database. Every request here is answered before a query would run.

#![allow(clippy::unwrap_used)]

use std::net::Ipv4Addr;

use axum::http::{Method, StatusCode};
use serde_json::json;

use emporium_core::Role;
use emporium_integration_tests::TestApp;

#[tokio::test]
async fn test_health_carries_request_id_and_security_headers() {
    let app = TestApp::offline();
    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key("x-request-id"));
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_missing_token_is_401_with_error_body() {
    let app = TestApp::offline();
    let response = app.get("/api/v1/orders/my", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["statusCode"], 401);
    assert_eq!(response.body["error"], "Unauthorized");
    assert!(response.body["message"].is_string());
}

#[tokio::test]
async fn test_garbage_token_rejected_even_on_public_routes() {
    let app = TestApp::offline();
    let response = app.get("/api/v1/products", Some("not-a-jwt")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_rejected() {
    let app = TestApp::offline();
    let forged = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
        eyJzdWIiOjEsImVtYWlsIjoiYUBiLmMiLCJyb2xlIjoiU1VQRVJfQURNSU4iLCJpYXQiOjAsImV4cCI6OTk5OTk5OTk5OX0.\
        c2lnbmF0dXJlLWZyb20tc29tZXdoZXJlLWVsc2U";
    let response = app.get("/api/v1/users", Some(forged)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_cannot_manage_catalog() {
    let app = TestApp::offline();
    let token = app.token_for(Role::User);

    let response = app
        .post("/api/v1/categories", Some(&token), json!({ "name": "Gadgets" }))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["statusCode"], 403);
    assert_eq!(response.body["error"], "Forbidden");

    let response = app
        .post(
            "/api/v1/products/bulk-price",
            Some(&token),
            json!({ "productIds": [1], "mode": "percent", "value": "10" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_roles_are_scoped() {
    let app = TestApp::offline();

    // Support can read all orders but not move them along.
    let support = app.token_for(Role::Support);
    let response = app
        .patch(
            "/api/v1/orders/1/status",
            Some(&support),
            json!({ "status": "CONFIRMED" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let moderator = app.token_for(Role::Moderator);
    let response = app
        .post(
            "/api/v1/notifications/broadcast",
            Some(&moderator),
            json!({ "title": "Sale", "message": "Everything -20%" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/api/v1/blog/admin/posts", Some(&moderator)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let partner = app.token_for(Role::Partner);
    let response = app.get("/api/v1/reviews", Some(&partner)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .post("/api/v1/search/reindex", Some(&partner), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_order_statuses_are_public() {
    let app = TestApp::offline();
    let response = app.get("/api/v1/orders/statuses", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let statuses = response.body.as_array().unwrap();
    assert_eq!(statuses.len(), 7);
    assert_eq!(statuses[0]["value"], "PENDING");
    assert!(statuses.iter().any(|s| s["value"] == "REFUNDED"));
}

#[tokio::test]
async fn test_malformed_input_is_400_with_error_body() {
    let app = TestApp::offline();

    let responses = [
        app.post("/api/v1/auth/login", None, json!({ "email": 5 })).await,
        app.send(Method::POST, "/api/v1/auth/login", None, None).await,
        app.get("/api/v1/products/abc", None).await,
        app.get("/api/v1/products?page=first", None).await,
    ];
    for response in responses {
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{:?}", response.body);
        assert_eq!(response.body["statusCode"], 400);
        assert_eq!(response.body["error"], "Bad Request");
        assert!(response.body["message"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::offline();
    let response = app.get("/api/v1/warehouses", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inbound_request_id_is_echoed() {
    let app = TestApp::offline();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(
        emporium_api::routes::router(app.state().clone()),
        request,
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let app = TestApp::offline();
    let client = Ipv4Addr::new(192, 0, 2, 7);

    // No body: each attempt is rejected by the JSON extractor, after the limiter.
    for _ in 0..5 {
        let response = app
            .send_from(client, Method::POST, "/api/v1/auth/login", None, None)
            .await;
        assert_ne!(response.status, StatusCode::TOO_MANY_REQUESTS);
    }
    let response = app
        .send_from(client, Method::POST, "/api/v1/auth/login", None, None)
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);

    let other = Ipv4Addr::new(192, 0, 2, 8);
    let response = app
        .send_from(other, Method::POST, "/api/v1/auth/login", None, None)
        .await;
    assert_ne!(response.status, StatusCode::TOO_MANY_REQUESTS);
}
