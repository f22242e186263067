//! Catalog administration against a real database.
//!
//! Skipped unless `TEST_DATABASE_URL` is set.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use emporium_core::Role;
use emporium_integration_tests::{TestApp, money, unique_suffix};

fn find_node<'a>(nodes: &'a [Value], id: &Value) -> Option<&'a Value> {
    nodes.iter().find_map(|node| {
        if &node["id"] == id {
            Some(node)
        } else {
            find_node(node["children"].as_array()?, id)
        }
    })
}

async fn price_of(app: &TestApp, product: &Value) -> f64 {
    let uri = format!("/api/v1/products/{}", product["id"]);
    money(&app.get(&uri, None).await.body["price"])
}

#[tokio::test]
async fn test_slugs_get_numeric_suffixes() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::ContentManager).await;
    let name = format!("Teapot {}", unique_suffix());

    let first = app
        .post("/api/v1/products", Some(&admin), json!({ "name": name, "price": "12.00" }))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    let second = app
        .post("/api/v1/products", Some(&admin), json!({ "name": name, "price": "14.00" }))
        .await;
    assert_eq!(second.status, StatusCode::CREATED);

    let base = first.body["slug"].as_str().unwrap();
    assert_eq!(second.body["slug"], format!("{base}-2"));

    let response = app
        .post(
            "/api/v1/products",
            Some(&admin),
            json!({ "name": "Another teapot", "slug": base, "price": "1.00" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app.get(&format!("/api/v1/products/slug/{base}"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], first.body["id"]);
}

#[tokio::test]
async fn test_inactive_products_hidden_from_customers() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let (_, customer) = app.login_as(Role::User).await;

    let response = app
        .post(
            "/api/v1/products",
            Some(&admin),
            json!({ "name": format!("Draft {}", unique_suffix()), "price": "5.00", "isActive": false }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let uri = format!("/api/v1/products/{}", response.body["id"]);

    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&customer)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&admin)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_bulk_price_update_is_all_or_nothing() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let cheap = app.create_product(&admin, "4.00", 1).await;
    let dear = app.create_product(&admin, "100.00", 1).await;

    let response = app
        .post(
            "/api/v1/products/bulk-price",
            Some(&admin),
            json!({ "productIds": [cheap["id"], dear["id"]], "mode": "percent", "value": "10" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["updated"], 2);

    assert!((price_of(&app, &cheap).await - 4.4).abs() < 1e-9);
    assert!((price_of(&app, &dear).await - 110.0).abs() < 1e-9);

    // Would take the cheap product below zero, so nothing changes.
    let response = app
        .post(
            "/api/v1/products/bulk-price",
            Some(&admin),
            json!({ "productIds": [cheap["id"], dear["id"]], "mode": "fixed", "value": "-5" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!((price_of(&app, &cheap).await - 4.4).abs() < 1e-9);
    assert!((price_of(&app, &dear).await - 110.0).abs() < 1e-9);

    let response = app
        .post(
            "/api/v1/products/bulk-price",
            Some(&admin),
            json!({ "mode": "percent", "value": "10" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    for (mode, value) in [
        ("percent", "79228162514264337593543950335"),
        ("fixed", "79228162514264337593543950335"),
        ("percent", "10000.01"),
    ] {
        let response = app
            .post(
                "/api/v1/products/bulk-price",
                Some(&admin),
                json!({ "productIds": [dear["id"]], "mode": mode, "value": value }),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{mode} {value}");
        assert_eq!(response.body["statusCode"], 400);
    }
    assert!((price_of(&app, &dear).await - 110.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_html_import_creates_then_updates() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let sku = format!("IMP-{}", unique_suffix());
    let html = format!(
        "<table>\
           <tr><th>Title</th><th>Article</th><th>Price</th><th>Qty</th></tr>\
           <tr><td>Imported kettle</td><td>{sku}</td><td>1 299,50</td><td>4</td></tr>\
           <tr><td>Broken row</td><td></td><td>call us</td><td>1</td></tr>\
         </table>"
    );

    let response = app
        .post("/api/v1/products/import", Some(&admin), json!({ "html": html }))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["created"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["updated"].as_array().unwrap().len(), 0);
    let errors = response.body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 2);
    let id = response.body["created"][0]["id"].clone();

    let html = format!(
        "<table><tr><th>Name</th><th>SKU</th><th>Price</th></tr>\
         <tr><td>Imported kettle v2</td><td>{sku}</td><td>1500</td></tr></table>"
    );
    let response = app
        .post("/api/v1/products/import", Some(&admin), json!({ "html": html }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["updated"][0]["id"], id);

    let product = app.get(&format!("/api/v1/products/{id}"), None).await.body;
    assert!((money(&product["price"]) - 1500.0).abs() < f64::EPSILON);
    // No stock column the second time, so stock is untouched.
    assert_eq!(product["stock"], 4);

    let response = app
        .post(
            "/api/v1/products/import",
            Some(&admin),
            json!({ "html": "<p>no table here</p>" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_tree_and_delete_guards() {
    let Some(app) = TestApp::from_env().await else {
        return;
    };
    let (_, admin) = app.login_as(Role::Admin).await;
    let parent = app.create_category(&admin).await;

    let response = app
        .post(
            "/api/v1/categories",
            Some(&admin),
            json!({ "name": format!("Child {}", unique_suffix()), "parentId": parent["id"] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let child = response.body;

    let response = app.get("/api/v1/categories/tree", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let node = find_node(response.body.as_array().unwrap(), &parent["id"]).unwrap();
    assert_eq!(node["children"][0]["id"], child["id"]);

    // A category cannot become its own ancestor.
    let response = app
        .patch(
            &format!("/api/v1/categories/{}", parent["id"]),
            Some(&admin),
            json!({ "parentId": child["id"] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let parent_uri = format!("/api/v1/categories/{}", parent["id"]);
    let response = app.delete(&parent_uri, Some(&admin)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let child_uri = format!("/api/v1/categories/{}", child["id"]);
    assert!(app.delete(&child_uri, Some(&admin)).await.status.is_success());
    assert!(app.delete(&parent_uri, Some(&admin)).await.status.is_success());
    assert_eq!(app.get(&parent_uri, None).await.status, StatusCode::NOT_FOUND);
}
