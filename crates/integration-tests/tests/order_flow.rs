//! Checkout and order lifecycle against a real database.
//!
//! Skipped unless `TEST_DATABASE_URL` is set.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use emporium_core::Role;
use emporium_integration_tests::{TEST_PASSWORD, TestApp, money, unique_email};

fn order_body(product_id: &Value, quantity: u32) -> Value {
    json!({
        "items": [{ "productId": product_id, "quantity": quantity }],
        "shippingAddress": {
            "recipient": "Ada Lovelace",
            "city": "London",
            "street": "12 St James's Square"
        },
        "contactPhone": "+44 20 7946 0000"
    })
}

async fn stock_of(app: &TestApp, product_id: &Value) -> i64 {
    let response = app.get(&format!("/api/v1/products/{product_id}"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    response.body["stock"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_then_me() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let email = unique_email("shopper");

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "email": email, "password": TEST_PASSWORD, "name": "Shopper" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["user"]["role"], "USER");
    let token = response.body["accessToken"].as_str().unwrap().to_owned();

    let response = app.get("/api/v1/auth/me", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["email"], email.as_str());

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "email": email, "password": TEST_PASSWORD, "name": "Again" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "email": email, "password": "wrong-password-1" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_lifecycle_moves_stock() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let (_, customer) = app.login_as(Role::User).await;
    let product = app.create_product(&admin, "100.00", 5).await;
    let product_id = &product["id"];

    let response = app
        .post("/api/v1/orders", Some(&customer), order_body(product_id, 2))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    let order = response.body;
    assert_eq!(order["status"], "PENDING");
    assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));
    assert!((money(&order["subtotal"]) - 200.0).abs() < f64::EPSILON);
    assert!((money(&order["shippingCost"]) - 300.0).abs() < f64::EPSILON);
    assert!((money(&order["total"]) - 500.0).abs() < f64::EPSILON);
    assert_eq!(stock_of(&app, product_id).await, 3);

    let order_uri = format!("/api/v1/orders/{}", order["id"]);

    // More than what is left.
    let response = app
        .post("/api/v1/orders", Some(&customer), order_body(product_id, 4))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(stock_of(&app, product_id).await, 3);

    let response = app
        .patch(
            &format!("{order_uri}/status"),
            Some(&customer),
            json!({ "status": "CONFIRMED" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .patch(
            &format!("{order_uri}/status"),
            Some(&admin),
            json!({ "status": "CONFIRMED", "comment": "Paid" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "CONFIRMED");

    let response = app
        .patch(
            &format!("{order_uri}/status"),
            Some(&admin),
            json!({ "status": "DELIVERED" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            &format!("{order_uri}/cancel"),
            Some(&customer),
            json!({ "reason": "Changed my mind" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "CANCELLED");
    assert!(response.body["cancelledAt"].is_string());
    assert_eq!(stock_of(&app, product_id).await, 5);

    let response = app.get(&format!("{order_uri}/history"), Some(&customer)).await;
    assert_eq!(response.status, StatusCode::OK);
    let statuses: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|change| change["toStatus"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["PENDING", "CONFIRMED", "CANCELLED"]);
}

#[tokio::test]
async fn test_free_shipping_threshold() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let (_, customer) = app.login_as(Role::User).await;
    let product = app.create_product(&admin, "2500.00", 10).await;

    let response = app
        .post("/api/v1/orders", Some(&customer), order_body(&product["id"], 2))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(money(&response.body["shippingCost"]).abs() < f64::EPSILON);
    assert!((money(&response.body["total"]) - 5000.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let (_, owner) = app.login_as(Role::User).await;
    let (_, stranger) = app.login_as(Role::User).await;
    let (_, support) = app.login_as(Role::Support).await;
    let product = app.create_product(&admin, "10.00", 3).await;

    let response = app
        .post("/api/v1/orders", Some(&owner), order_body(&product["id"], 1))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let order_uri = format!("/api/v1/orders/{}", response.body["id"]);

    assert_eq!(app.get(&order_uri, Some(&owner)).await.status, StatusCode::OK);
    assert_eq!(app.get(&order_uri, Some(&stranger)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&order_uri, Some(&support)).await.status, StatusCode::OK);

    let response = app
        .post(&format!("{order_uri}/cancel"), Some(&stranger), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verified_purchase_review() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let (_, buyer) = app.login_as(Role::User).await;
    let (_, browser) = app.login_as(Role::User).await;
    let product = app.create_product(&admin, "40.00", 3).await;
    let product_id = &product["id"];

    let response = app
        .post("/api/v1/orders", Some(&buyer), order_body(product_id, 1))
        .await;
    let order_uri = format!("/api/v1/orders/{}", response.body["id"]);
    for status in ["CONFIRMED", "PROCESSING", "SHIPPED", "DELIVERED"] {
        let response = app
            .patch(
                &format!("{order_uri}/status"),
                Some(&admin),
                json!({ "status": status }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{status}: {:?}", response.body);
    }

    let reviews_uri = format!("/api/v1/products/{product_id}/reviews");
    let response = app
        .post(&reviews_uri, Some(&buyer), json!({ "rating": 5, "body": "Great" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["isVerifiedPurchase"], true);

    let response = app
        .post(&reviews_uri, Some(&buyer), json!({ "rating": 4, "body": "Still great" }))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .post(&reviews_uri, Some(&browser), json!({ "rating": 3, "body": "Looks fine" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["isVerifiedPurchase"], false);

    let response = app
        .post(&reviews_uri, Some(&browser), json!({ "rating": 6, "body": "Too good" }))
        .await;
    assert!(response.status.is_client_error());
}
