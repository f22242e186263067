//! Catalog products, bulk operations and competitor price checks.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use emporium_core::ProductId;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::import::{ImportReport, ImportRequest, Importer};
use crate::middleware::{ManageCatalog, OptionalAuth, Require};
use crate::models::product::{
    BulkPriceRequest, BulkPriceResult, ImageRequest, Product, ProductFilter, ProductInput,
    ProductPatch,
};
use crate::models::{Paginated, Pagination};
use crate::scraper::PriceComparison;
use crate::services::products::ProductService;
use crate::state::AppState;

/// GET /api/v1/products
pub async fn list(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Query(mut filter): Query<ProductFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Product>>, AppError> {
    filter.include_inactive &= viewer.sees_inactive_catalog();
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .list(&filter, page)
            .await?,
    ))
}

/// GET /api/v1/products/{id}
pub async fn get(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .get(id, viewer.sees_inactive_catalog())
            .await?,
    ))
}

/// GET /api/v1/products/slug/{slug}
pub async fn get_by_slug(
    State(state): State<AppState>,
    viewer: OptionalAuth,
    Path(slug): Path<String>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .get_by_slug(&slug, viewer.sees_inactive_catalog())
            .await?,
    ))
}

/// POST /api/v1/products
pub async fn create(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = ProductService::new(state.pool(), state.search())
        .create(input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PATCH /api/v1/products/{id}
pub async fn update(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .update(id, patch)
            .await?,
    ))
}

/// DELETE /api/v1/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    ProductService::new(state.pool(), state.search())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reprice a selection of products atomically.
///
/// POST /api/v1/products/bulk-price
pub async fn bulk_price(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Json(request): Json<BulkPriceRequest>,
) -> Result<Json<BulkPriceResult>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .bulk_price_update(&request)
            .await?,
    ))
}

/// Create or update products from a pasted HTML table. Rows are applied
/// independently; failures are listed in the report.
///
/// POST /api/v1/products/import
pub async fn import(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportReport>, AppError> {
    Ok(Json(
        Importer::new(state.pool(), state.search())
            .import_html(&request.html)
            .await?,
    ))
}

/// POST /api/v1/products/{id}/images
pub async fn add_image(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<ProductId>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .add_image(id, &request.url)
            .await?,
    ))
}

/// DELETE /api/v1/products/{id}/images
pub async fn remove_image(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<ProductId>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        ProductService::new(state.pool(), state.search())
            .remove_image(id, &request.url)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub url: String,
}

/// Our price against the one found at `url`.
///
/// GET /api/v1/products/{id}/price-compare?url=
pub async fn price_compare(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Path(id): Path<ProductId>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<PriceComparison>, AppError> {
    let product = ProductService::new(state.pool(), state.search())
        .get(id, true)
        .await?;
    let scraped = state.scraper().check(&query.url).await?;
    Ok(Json(PriceComparison::new(&product, scraped)))
}
