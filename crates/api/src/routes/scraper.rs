//! Ad-hoc competitor price checks.

use axum::extract::State;
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::Json;
use crate::middleware::{ManageCatalog, Require};
use crate::scraper::ScrapedPrice;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

/// POST /api/v1/price-scraper/check
pub async fn check(
    State(state): State<AppState>,
    _: Require<ManageCatalog>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ScrapedPrice>, AppError> {
    Ok(Json(state.scraper().check(&request.url).await?))
}
