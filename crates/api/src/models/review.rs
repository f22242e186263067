//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{ProductId, ReviewId, ReviewStatus, UserId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: i16,
    pub title: Option<String>,
    pub body: String,
    pub status: ReviewStatus,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub rating: i16,
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewStatusRequest {
    pub status: ReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    pub status: Option<ReviewStatus>,
    pub product_id: Option<ProductId>,
}
