//! HTTP routes.
//!
//! Everything lives under `/api/v1` except the health checks and the static
//! `/uploads` directory.
//!
//! ```text
//! /auth          register, login, me (register/login rate limited)
//! /users         account administration
//! /categories    category tree
//! /products      catalog, bulk price, import, images, price compare, reviews
//! /reviews       moderation
//! /orders        checkout and lifecycle
//! /blog          public posts and /blog/admin
//! /cms           hero, footer, navigation, advantages
//! /support       support chat
//! /notifications inbox and broadcast
//! /search        product search and reindex
//! /price-scraper competitor price check
//! /uploads       image upload
//! ```

pub mod auth;
pub mod blog;
pub mod categories;
pub mod cms;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod scraper;
pub mod search;
pub mod support;
pub mod uploads;
pub mod users;

use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    routing::{get, patch, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    REQUEST_ID_HEADER, auth_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::services::uploads::PUBLIC_PREFIX;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// The complete application: API, health checks, static uploads and the
/// shared middleware stack. Sentry layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config().uploads.max_bytes + MULTIPART_OVERHEAD;
    let cors = cors_layer(&state.config().cors_origins);

    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/v1", api_routes(upload_limit))
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config().uploads.dir))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        );

    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };
    app.with_state(state)
}

fn api_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/reviews", review_routes())
        .nest("/orders", order_routes())
        .nest("/blog", blog_routes())
        .nest("/cms", cms_routes())
        .nest("/support", support_routes())
        .nest("/notifications", notification_routes())
        .route("/search/products", get(search::products))
        .route("/search/reindex", post(search::reindex))
        .route("/price-scraper/check", post(scraper::check))
        .route(
            "/uploads/{feature}",
            post(uploads::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/me", get(auth::me))
}

fn user_routes() -> Router<AppState> {
    Router::new().route("/", get(users::list)).route(
        "/{id}",
        get(users::get).patch(users::update).delete(users::delete),
    )
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/tree", get(categories::tree))
        .route("/slug/{slug}", get(categories::get_by_slug))
        .route(
            "/{id}",
            get(categories::get)
                .patch(categories::update)
                .delete(categories::delete),
        )
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/slug/{slug}", get(products::get_by_slug))
        .route("/bulk-price", post(products::bulk_price))
        .route("/import", post(products::import))
        .route(
            "/{id}",
            get(products::get)
                .patch(products::update)
                .delete(products::delete),
        )
        .route(
            "/{id}/images",
            post(products::add_image).delete(products::remove_image),
        )
        .route("/{id}/price-compare", get(products::price_compare))
        .route(
            "/{id}/reviews",
            get(reviews::list_for_product).post(reviews::create),
        )
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::list))
        .route("/{id}", axum::routing::delete(reviews::delete))
        .route("/{id}/status", patch(reviews::set_status))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/statuses", get(orders::statuses))
        .route("/my", get(orders::list_mine))
        .route("/{id}", get(orders::get))
        .route("/{id}/history", get(orders::history))
        .route("/{id}/status", patch(orders::update_status))
        .route("/{id}/cancel", post(orders::cancel))
}

fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(blog::list_published))
        .route("/posts/{slug}", get(blog::get_published))
        .route("/admin/posts", get(blog::list_all).post(blog::create))
        .route(
            "/admin/posts/{id}",
            get(blog::get).patch(blog::update).delete(blog::delete),
        )
}

fn cms_routes() -> Router<AppState> {
    Router::new()
        .route("/hero", get(cms::hero).put(cms::put_hero))
        .route("/footer", get(cms::footer).put(cms::put_footer))
        .route(
            "/navigation",
            get(cms::navigation).post(cms::create_navigation),
        )
        .route("/navigation/reorder", put(cms::reorder_navigation))
        .route(
            "/navigation/{id}",
            patch(cms::update_navigation).delete(cms::delete_navigation),
        )
        .route(
            "/advantages",
            get(cms::advantages).post(cms::create_advantage),
        )
        .route("/advantages/reorder", put(cms::reorder_advantages))
        .route(
            "/advantages/{id}",
            patch(cms::update_advantage).delete(cms::delete_advantage),
        )
}

fn support_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(support::list).post(support::open),
        )
        .route("/conversations/{id}", get(support::get))
        .route("/conversations/{id}/messages", post(support::post_message))
        .route("/conversations/{id}/read", post(support::mark_read))
        .route("/conversations/{id}/assign", patch(support::assign))
        .route("/conversations/{id}/status", patch(support::set_status))
        .route("/unread-count", get(support::unread_count))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/broadcast", post(notifications::broadcast))
        .route("/{id}", axum::routing::delete(notifications::delete))
        .route("/{id}/read", patch(notifications::mark_read))
}

/// `None` when no origins are configured, so same-origin deployments carry
/// no CORS headers at all.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
            .max_age(Duration::from_secs(60 * 60)),
    )
}

/// Liveness: the process is up.
async fn health() -> &'static str {
    "ok"
}

/// Readiness: the database answers. 503 otherwise.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["https://shop.example".to_owned()]).is_some());
    }
}
