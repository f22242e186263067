//! Checkout and order lifecycle.

use axum::{extract::State, http::StatusCode};

use emporium_core::OrderId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{AuthUser, ManageOrders, Require, ViewAllOrders};
use crate::models::order::{
    CancelRequest, CreateOrderRequest, Order, OrderFilter, OrderStatusChange, StatusOption,
    StatusUpdateRequest,
};
use crate::models::{Paginated, Pagination};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// GET /api/v1/orders/statuses
pub async fn statuses() -> Json<Vec<StatusOption>> {
    Json(OrderService::statuses())
}

/// Place an order for the caller.
///
/// POST /api/v1/orders
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = OrderService::new(state.pool())
        .create(user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/v1/orders/my
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Order>>, AppError> {
    Ok(Json(
        OrderService::new(state.pool())
            .list_mine(user.id, page)
            .await?,
    ))
}

/// GET /api/v1/orders
pub async fn list(
    State(state): State<AppState>,
    _: Require<ViewAllOrders>,
    Query(filter): Query<OrderFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Order>>, AppError> {
    Ok(Json(
        OrderService::new(state.pool())
            .list(&filter, page)
            .await?,
    ))
}

/// GET /api/v1/orders/{id}
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(OrderService::new(state.pool()).get(&user, id).await?))
}

/// GET /api/v1/orders/{id}/history
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<OrderStatusChange>>, AppError> {
    Ok(Json(
        OrderService::new(state.pool())
            .history(&user, id)
            .await?,
    ))
}

/// PATCH /api/v1/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Require { user, .. }: Require<ManageOrders>,
    Path(id): Path<OrderId>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        OrderService::new(state.pool())
            .update_status(&user, id, request.status, request.comment)
            .await?,
    ))
}

/// Owners cancel early orders; order managers per the status table.
///
/// POST /api/v1/orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Order>, AppError> {
    let reason = body.and_then(|Json(request)| request.reason);
    Ok(Json(
        OrderService::new(state.pool())
            .cancel(&user, id, reason)
            .await?,
    ))
}
