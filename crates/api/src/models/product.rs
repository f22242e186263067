//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{Adjustment, CategoryId, Money, ProductId, Slug};

use super::category::default_true;
use super::double_option;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    /// Denormalized for listings and the search index.
    pub category_name: Option<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub rating_avg: Decimal,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub slug: Option<Slug>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    #[serde(default, deserialize_with = "double_option")]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<Money>,
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Money>>,
    pub stock: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Listing order for `GET /products`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    /// `ORDER BY` clause. Values are fixed strings, never user input.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
            Self::Rating => "p.rating_avg DESC, p.rating_count DESC, p.id DESC",
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive match on name or SKU.
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Only honoured for catalog managers.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Which products a bulk price change touches.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPriceRequest {
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    pub category_id: Option<CategoryId>,
    pub mode: AdjustmentMode,
    pub value: Decimal,
}

/// Largest percentage a single bulk update may raise prices by.
pub const MAX_PERCENT_INCREASE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

impl BulkPriceRequest {
    /// Reject adjustments that could never produce a storable price.
    ///
    /// # Errors
    ///
    /// Returns a message when a percentage is outside `-100..=10000` or a
    /// fixed amount exceeds the largest price.
    pub fn check_bounds(&self) -> Result<(), String> {
        match self.mode {
            AdjustmentMode::Percent
                if self.value < -Decimal::ONE_HUNDRED || self.value > MAX_PERCENT_INCREASE =>
            {
                Err(format!(
                    "percent must be between -100 and {MAX_PERCENT_INCREASE}"
                ))
            }
            AdjustmentMode::Fixed if self.value.abs() > Money::MAX => {
                Err(format!("fixed amount must not exceed {}", Money::MAX))
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub const fn adjustment(&self) -> Adjustment {
        match self.mode {
            AdjustmentMode::Percent => Adjustment::Percent(self.value),
            AdjustmentMode::Fixed => Adjustment::Fixed(self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    Percent,
    Fixed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPriceResult {
    pub updated: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub url: String,
}

/// `GET /search/products?q=&limit=`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<u32>,
}

/// Which backend answered a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEngine {
    Elasticsearch,
    Database,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub engine: SearchEngine,
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexResult {
    pub indexed: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_bulk_price_request_shape() {
        let req: BulkPriceRequest =
            serde_json::from_str(r#"{"categoryId":3,"mode":"percent","value":"-10"}"#).unwrap();
        assert_eq!(req.category_id, Some(CategoryId::new(3)));
        assert!(req.product_ids.is_empty());
        assert_eq!(
            req.adjustment(),
            Adjustment::Percent(Decimal::from_str("-10").unwrap())
        );
    }

    #[test]
    fn test_bulk_price_bounds() {
        let parse = |body: &str| serde_json::from_str::<BulkPriceRequest>(body).unwrap();

        assert!(parse(r#"{"mode":"percent","value":"-100"}"#).check_bounds().is_ok());
        assert!(parse(r#"{"mode":"percent","value":"10000"}"#).check_bounds().is_ok());
        assert!(parse(r#"{"mode":"percent","value":"-100.01"}"#).check_bounds().is_err());
        assert!(
            parse(r#"{"mode":"percent","value":"79228162514264337593543950335"}"#)
                .check_bounds()
                .is_err()
        );
        assert!(parse(r#"{"mode":"fixed","value":"-9999999999.99"}"#).check_bounds().is_ok());
        assert!(
            parse(r#"{"mode":"fixed","value":"79228162514264337593543950335"}"#)
                .check_bounds()
                .is_err()
        );
    }

    #[test]
    fn test_sort_names() {
        let filter: ProductFilter = serde_json::from_str(r#"{"sort":"price_desc"}"#).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        let filter: ProductFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.sort, ProductSort::Newest);
    }

    #[test]
    fn test_input_rejects_negative_price() {
        let res: Result<ProductInput, _> =
            serde_json::from_str(r#"{"name":"Kettle","price":"-1"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_patch_distinguishes_null() {
        let patch: ProductPatch = serde_json::from_str(r#"{"compareAtPrice":null}"#).unwrap();
        assert!(matches!(patch.compare_at_price, Some(None)));
        assert!(patch.sku.is_none());
    }
}
