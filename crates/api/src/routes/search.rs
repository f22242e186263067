//! Product search.

use axum::extract::State;

use crate::error::AppError;
use crate::extract::{Json, Query};
use crate::middleware::{ManageCatalog, Require};
use crate::models::product::{ReindexResult, SearchQuery, SearchResults};
use crate::services::products::ProductService;
use crate::state::AppState;

/// GET /api/v1/search/products?q=&limit=
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .search(&query.q, query.limit)
            .await?,
    ))
}

/// POST /api/v1/search/reindex
pub async fn reindex(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
) -> Result<Json<ReindexResult>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .reindex()
            .await?,
    ))
}
