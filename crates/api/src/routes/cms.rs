//! Storefront content blocks: hero, footer, navigation, advantages.
//!
//! Reads are public; `includeInactive` only takes effect for content
//! managers. Writes need `ManageContent`.

use axum::{extract::State, http::StatusCode};

use emporium_core::{AdvantageId, NavigationItemId};

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{ManageContent, OptionalAuth, Require};
use crate::models::cms::{
    Advantage, AdvantageInput, AdvantagePatch, FooterBlock, HeroBlock, ListQuery, NavigationItem,
    NavigationItemInput, NavigationItemPatch, ReorderRequest,
};
use crate::services::cms::CmsService;
use crate::state::AppState;

fn include_inactive(viewer: &OptionalAuth, query: &ListQuery) -> bool {
    query.include_inactive
        && viewer
            .0
            .as_ref()
            .is_some_and(|u| u.role.can_manage_content())
}

// =============================================================================
// Single blocks
// =============================================================================

/// GET /api/v1/cms/hero
pub async fn hero(State(state): State<AppState>) -> Result<Json<HeroBlock>, AppError> {
    Ok(Json(CmsService::new(state.pool()).hero().await?))
}

/// PUT /api/v1/cms/hero
pub async fn put_hero(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(hero): Json<HeroBlock>,
) -> Result<Json<HeroBlock>, AppError> {
    Ok(Json(CmsService::new(state.pool()).upsert_hero(hero).await?))
}

/// GET /api/v1/cms/footer
pub async fn footer(State(state): State<AppState>) -> Result<Json<FooterBlock>, AppError> {
    Ok(Json(CmsService::new(state.pool()).footer().await?))
}

/// PUT /api/v1/cms/footer
pub async fn put_footer(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(footer): Json<FooterBlock>,
) -> Result<Json<FooterBlock>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .upsert_footer(footer)
            .await?,
    ))
}

// =============================================================================
// Navigation
// =============================================================================

/// GET /api/v1/cms/navigation
pub async fn navigation(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NavigationItem>>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .navigation(include_inactive(&viewer, &query))
            .await?,
    ))
}

/// POST /api/v1/cms/navigation
pub async fn create_navigation(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(input): Json<NavigationItemInput>,
) -> Result<(StatusCode, Json<NavigationItem>), AppError> {
    let item = CmsService::new(state.pool())
        .create_navigation(input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/v1/cms/navigation/{id}
pub async fn update_navigation(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<NavigationItemId>,
    Json(patch): Json<NavigationItemPatch>,
) -> Result<Json<NavigationItem>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .update_navigation(id, patch)
            .await?,
    ))
}

/// DELETE /api/v1/cms/navigation/{id}
pub async fn delete_navigation(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<NavigationItemId>,
) -> Result<StatusCode, AppError> {
    CmsService::new(state.pool()).delete_navigation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cms/navigation/reorder
pub async fn reorder_navigation(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(request): Json<ReorderRequest<NavigationItemId>>,
) -> Result<Json<Vec<NavigationItem>>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .reorder_navigation(&request.ids)
            .await?,
    ))
}

// =============================================================================
// Advantages
// =============================================================================

/// GET /api/v1/cms/advantages
pub async fn advantages(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Advantage>>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .advantages(include_inactive(&viewer, &query))
            .await?,
    ))
}

/// POST /api/v1/cms/advantages
pub async fn create_advantage(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(input): Json<AdvantageInput>,
) -> Result<(StatusCode, Json<Advantage>), AppError> {
    let advantage = CmsService::new(state.pool())
        .create_advantage(input)
        .await?;
    Ok((StatusCode::CREATED, Json(advantage)))
}

/// PATCH /api/v1/cms/advantages/{id}
pub async fn update_advantage(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<AdvantageId>,
    Json(patch): Json<AdvantagePatch>,
) -> Result<Json<Advantage>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .update_advantage(id, patch)
            .await?,
    ))
}

/// DELETE /api/v1/cms/advantages/{id}
pub async fn delete_advantage(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Path(id): Path<AdvantageId>,
) -> Result<StatusCode, AppError> {
    CmsService::new(state.pool()).delete_advantage(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cms/advantages/reorder
pub async fn reorder_advantages(
    State(state): State<AppState>,
    _: Require<ManageContent>,
    Json(request): Json<ReorderRequest<AdvantageId>>,
) -> Result<Json<Vec<Advantage>>, AppError> {
    Ok(Json(
        CmsService::new(state.pool())
            .reorder_advantages(&request.ids)
            .await?,
    ))
}
