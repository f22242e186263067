//! Support chat between customers and support staff.

use axum::{extract::State, http::StatusCode};

use emporium_core::ConversationId;

use super::notifications::UpdatedResponse;
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, HandleSupport, Require};
use crate::models::notification::CountResponse;
use crate::models::support::{
    AssignRequest, Conversation, ConversationDetail, ConversationFilter, ConversationStatusRequest,
    OpenConversationRequest, PostMessageRequest, SupportMessage,
};
use crate::models::{Paginated, Pagination};
use crate::services::support::SupportService;
use crate::state::AppState;

/// POST /api/v1/support/conversations
pub async fn open(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<OpenConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDetail>), AppError> {
    let detail = SupportService::new(state.pool())
        .open(&user, &request.subject, &request.message)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Customers see their own conversations; support staff see all.
///
/// GET /api/v1/support/conversations
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<ConversationFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Conversation>>, AppError> {
    Ok(Json(
        SupportService::new(state.pool())
            .list(&user, filter.status, page)
            .await?,
    ))
}

/// GET /api/v1/support/conversations/{id}
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationDetail>, AppError> {
    Ok(Json(SupportService::new(state.pool()).get(&user, id).await?))
}

/// POST /api/v1/support/conversations/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<ConversationId>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<SupportMessage>), AppError> {
    let message = SupportService::new(state.pool())
        .post_message(&user, id, &request.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Mark the other side's messages as read.
///
/// POST /api/v1/support/conversations/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = SupportService::new(state.pool())
        .mark_read(&user, id)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// PATCH /api/v1/support/conversations/{id}/assign
pub async fn assign(
    State(state): State<AppState>,
    Require { user, .. }: Require<HandleSupport>,
    Path(id): Path<ConversationId>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(
        SupportService::new(state.pool())
            .assign(&user, id, request.staff_id)
            .await?,
    ))
}

/// PATCH /api/v1/support/conversations/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    Require { user, .. }: Require<HandleSupport>,
    Path(id): Path<ConversationId>,
    Json(request): Json<ConversationStatusRequest>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(
        SupportService::new(state.pool())
            .set_status(&user, id, request.status)
            .await?,
    ))
}

/// GET /api/v1/support/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = SupportService::new(state.pool())
        .unread_count(&user)
        .await?;
    Ok(Json(CountResponse { count }))
}
