//! The caller's notification inbox, plus admin broadcasts.

use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use emporium_core::NotificationId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, ManageUsers, Require};
use crate::models::notification::{BroadcastRequest, CountResponse, Notification, NotificationQuery};
use crate::models::{Paginated, Pagination};
use crate::services::notifications::NotificationService;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub sent: u64,
}

/// GET /api/v1/notifications
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<NotificationQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Notification>>, AppError> {
    Ok(Json(
        NotificationService::new(state.pool())
            .list(user.id, query.unread_only, page)
            .await?,
    ))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = NotificationService::new(state.pool())
        .unread_count(user.id)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// PATCH /api/v1/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, AppError> {
    NotificationService::new(state.pool())
        .mark_read(id, user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = NotificationService::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, AppError> {
    NotificationService::new(state.pool())
        .delete(id, user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/broadcast
pub async fn broadcast(
    State(state): State<AppState>,
    _: Require<ManageUsers>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, AppError> {
    let sent = NotificationService::new(state.pool())
        .broadcast(&request)
        .await?;
    Ok(Json(BroadcastResponse { sent }))
}
