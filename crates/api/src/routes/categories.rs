//! Category tree.

use axum::{extract::State, http::StatusCode};

use emporium_core::CategoryId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{ManageCatalog, OptionalAuth, Require};
use crate::models::category::{Category, CategoryInput, CategoryListQuery, CategoryNode, CategoryPatch};
use crate::services::categories::CategoryService;
use crate::state::AppState;

/// Flat list. `includeInactive` is ignored for non-managers.
///
/// GET /api/v1/categories
pub async fn list(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let include_inactive = query.include_inactive && viewer.sees_inactive_catalog();
    Ok(Json(
        CategoryService::new(state.pool())
            .list(include_inactive)
            .await?,
    ))
}

/// GET /api/v1/categories/tree
pub async fn tree(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Vec<CategoryNode>>, AppError> {
    let include_inactive = query.include_inactive && viewer.sees_inactive_catalog();
    Ok(Json(
        CategoryService::new(state.pool())
            .tree(include_inactive)
            .await?,
    ))
}

/// GET /api/v1/categories/{id}
pub async fn get(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>, AppError> {
    let category = CategoryService::new(state.pool()).get(id).await?;
    if !category.is_active && !viewer.sees_inactive_catalog() {
        return Err(AppError::not_found("Category"));
    }
    Ok(Json(category))
}

/// GET /api/v1/categories/slug/{slug}
pub async fn get_by_slug(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Path(slug): Path<String>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(
        CategoryService::new(state.pool())
            .get_by_slug(&slug, viewer.sees_inactive_catalog())
            .await?,
    ))
}

/// POST /api/v1/categories
pub async fn create(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = CategoryService::new(state.pool()).create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PATCH /api/v1/categories/{id}
pub async fn update(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<CategoryId>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(
        CategoryService::new(state.pool())
            .update(id, patch)
            .await?,
    ))
}

/// DELETE /api/v1/categories/{id}
pub async fn delete(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    CategoryService::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
