//! Registration, login and the current account.

use axum::{extract::State, http::StatusCode};

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::services::auth::AuthService;
use crate::services::users::UserService;
use crate::state::AppState;

/// Create a customer account and return a token for it.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = AuthService::new(state.pool(), state.jwt())
        .register(&request.email, &request.password, &request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::new(state.pool(), state.jwt())
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(response))
}

/// The full profile of the caller.
///
/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(UserService::new(state.pool()).get(user.id).await?))
}
