//! Blog: public reading and content-manager editing.

use axum::{extract::State, http::StatusCode};

use emporium_core::BlogPostId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{ManageContent, Require};
use crate::models::blog::{AdminPostQuery, BlogPost, BlogPostInput, BlogPostPatch, PublicPostQuery};
use crate::models::{Paginated, Pagination};
use crate::services::blog::BlogService;
use crate::state::AppState;

/// Published posts, newest first, optionally by tag.
///
/// GET /api/v1/blog/posts
pub async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PublicPostQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<BlogPost>>, AppError> {
    Ok(Json(
        BlogService::new(state.pool())
            .list_published(query.tag.as_deref(), page)
            .await?,
    ))
}

/// Counts a view.
///
/// GET /api/v1/blog/posts/{slug}
pub async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, AppError> {
    Ok(Json(
        BlogService::new(state.pool())
            .get_published_by_slug(&slug)
            .await?,
    ))
}

/// GET /api/v1/blog/admin/posts
pub async fn list_all(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Query(query): Query<AdminPostQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<BlogPost>>, AppError> {
    Ok(Json(
        BlogService::new(state.pool())
            .list_all(query.status, page)
            .await?,
    ))
}

/// GET /api/v1/blog/admin/posts/{id}
pub async fn get(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<BlogPostId>,
) -> Result<Json<BlogPost>, AppError> {
    Ok(Json(BlogService::new(state.pool()).get(id).await?))
}

/// POST /api/v1/blog/admin/posts
pub async fn create(
    State(state): State<AppState>,
    Require { user, .. }: Require<ManageContent>,
    Json(input): Json<BlogPostInput>,
) -> Result<(StatusCode, Json<BlogPost>), AppError> {
    let post = BlogService::new(state.pool()).create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PATCH /api/v1/blog/admin/posts/{id}
pub async fn update(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<BlogPostId>,
    Json(patch): Json<BlogPostPatch>,
) -> Result<Json<BlogPost>, AppError> {
    Ok(Json(BlogService::new(state.pool()).update(id, patch).await?))
}

/// DELETE /api/v1/blog/admin/posts/{id}
pub async fn delete(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<BlogPostId>,
) -> Result<StatusCode, AppError> {
    BlogService::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
