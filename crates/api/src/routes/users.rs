//! Account administration.

use axum::{extract::State, http::StatusCode};

use emporium_core::UserId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, ManageUsers, Require};
use crate::models::user::{User, UserFilter, UserUpdate};
use crate::models::{Paginated, Pagination};
use crate::services::users::UserService;
use crate::state::AppState;

/// GET /api/v1/users
pub async fn list(
    State(state): State<AppState>,
    _: Require<ManageUsers>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<User>>, AppError> {
    Ok(Json(UserService::new(state.pool()).list(&filter, page).await?))
}

/// Your own account, or anyone's for user managers.
///
/// GET /api/v1/users/{id}
pub async fn get(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    if actor.id != id && !actor.role.can_manage_users() {
        return Err(AppError::forbidden("you can only view your own account"));
    }
    Ok(Json(UserService::new(state.pool()).get(id).await?))
}

/// Profile edits for yourself; role and activation changes for admins.
///
/// PATCH /api/v1/users/{id}
pub async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        UserService::new(state.pool())
            .update(&actor, id, update)
            .await?,
    ))
}

/// DELETE /api/v1/users/{id}
pub async fn delete(
    State(state): State<AppState>,
    Require { user, .. }: Require<ManageUsers>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    UserService::new(state.pool()).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
