//! Product reviews and moderation.

use axum::{extract::State, http::StatusCode};

use emporium_core::{ProductId, ReviewId};

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, Moderate, Require};
use crate::models::review::{Review, ReviewFilter, ReviewInput, ReviewStatusRequest};
use crate::models::{Paginated, Pagination};
use crate::services::reviews::ReviewService;
use crate::state::AppState;

/// Approved reviews of one product.
///
/// GET /api/v1/products/{id}/reviews
pub async fn list_for_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Review>>, AppError> {
    Ok(Json(
        ReviewService::new(state.pool())
            .list_for_product(product_id, page)
            .await?,
    ))
}

/// POST /api/v1/products/{id}/reviews
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = ReviewService::new(state.pool())
        .create(&user, product_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Moderation queue, filterable by status and product.
///
/// GET /api/v1/reviews
pub async fn list(
    State(state): State<AppState>,
    _: Require<Moderate>,
    Query(filter): Query<ReviewFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Review>>, AppError> {
    Ok(Json(
        ReviewService::new(state.pool())
            .list(&filter, page)
            .await?,
    ))
}

/// PATCH /api/v1/reviews/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    _: Require<Moderate>,
    Path(id): Path<ReviewId>,
    Json(request): Json<ReviewStatusRequest>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(
        ReviewService::new(state.pool())
            .set_status(id, request.status)
            .await?,
    ))
}

/// Authors may delete their own review; moderators any.
///
/// DELETE /api/v1/reviews/{id}
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    ReviewService::new(state.pool()).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
