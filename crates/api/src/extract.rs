//! Request extractors whose rejections render as [`AppError`].
//!
//! Drop-in replacements for `axum::Json`, `Path`, `Query` and `Multipart`:
//! a malformed body, path segment or query string becomes a 400 with the
//! usual JSON error body instead of axum's plain-text rejection.

use axum::{
    extract::{
        FromRequest, FromRequestParts, OptionalFromRequest, Request,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body extractor and response.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// `Option<Json<T>>` is `None` when the request carries no JSON body.
impl<T, S> OptionalFromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <axum::Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(body.map(|axum::Json(value)| Self(value)))
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// `multipart/form-data` body.
pub struct Multipart(pub axum::extract::Multipart);

impl<S: Send + Sync> FromRequest<S> for Multipart {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            <axum::extract::Multipart as FromRequest<S>>::from_request(req, state).await?,
        ))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::StatusCode, routing::post};
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Deserialize)]
    struct Named {
        name: String,
    }

    #[derive(Deserialize)]
    struct Paging {
        #[allow(dead_code)]
        page: u32,
    }

    async fn echo(
        Path(id): Path<i32>,
        Query(_): Query<Paging>,
        Json(body): Json<Named>,
    ) -> Json<String> {
        Json(format!("{id}:{}", body.name))
    }

    async fn maybe(body: Option<Json<Named>>) -> Json<String> {
        Json(body.map_or_else(|| "none".to_owned(), |Json(named)| named.name))
    }

    #[tokio::test]
    async fn test_optional_body() {
        let app = Router::new().route("/maybe", post(maybe));
        let empty = Request::builder().method("POST").uri("/maybe").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(empty).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let broken = Request::builder()
            .method("POST")
            .uri("/maybe")
            .header("content-type", "application/json")
            .body(Body::from("{"))
            .unwrap();
        let response = app.oneshot(broken).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn call(uri: &str, content_type: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let app = Router::new().route("/items/{id}", post(echo));
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_owned()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_valid_request_passes_through() {
        let (status, body) = call("/items/7?page=1", "application/json", r#"{"name":"kettle"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "7:kettle");
    }

    #[tokio::test]
    async fn test_rejections_are_json_400s() {
        let cases = [
            ("/items/7?page=1", "application/json", r#"{"name":5}"#),
            ("/items/7?page=1", "application/json", "{not json"),
            ("/items/7?page=1", "text/plain", r#"{"name":"kettle"}"#),
            ("/items/abc?page=1", "application/json", r#"{"name":"kettle"}"#),
            ("/items/7?page=first", "application/json", r#"{"name":"kettle"}"#),
        ];
        for (uri, content_type, body) in cases {
            let (status, json) = call(uri, content_type, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
            assert_eq!(json["statusCode"], 400);
            assert_eq!(json["error"], "Bad Request");
            assert!(json["message"].is_string());
        }
    }
}
