//! Bulk product import from an HTML table.
//!
//! Each row is applied on its own: a failing row is reported and the rest
//! carry on, nothing already written is rolled back. Rows match existing
//! products by SKU, or by the slug derived from the name when the row has no
//! SKU.

mod price;
mod table;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{Money, ProductId, Slug};

pub use price::parse_price;
pub use table::{Column, ParsedTable, cell_text, parse_table};

use crate::db::{CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::models::product::{Product, ProductInput, ProductPatch};
use crate::search::SearchClient;
use crate::services::products::ProductService;

/// Upper bound on data rows per import.
pub const MAX_ROWS: usize = 1000;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no <table> found in the submitted HTML")]
    NoTable,
    #[error("the table has no header row")]
    NoHeader,
    #[error("the table has no data rows")]
    NoRows,
    #[error("the table has no {0:?} column")]
    MissingColumn(Column),
    #[error("the table has more than {max} rows")]
    TooManyRows { max: usize },
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// One product row as read from the table.
#[derive(Debug, Clone)]
pub struct ImportRow {
    /// 1-based data row number, for error reports.
    pub row: usize,
    pub name: String,
    pub sku: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    /// `None` leaves an existing product's stock alone.
    pub stock: Option<i32>,
    /// Category slug or name.
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedProduct {
    pub row: usize,
    pub id: ProductId,
    pub name: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<ImportedProduct>,
    pub updated: Vec<ImportedProduct>,
    pub errors: Vec<RowError>,
    /// Rows above the table header that were left out.
    #[serde(rename = "skippedBeforeHeader")]
    pub skipped_before_header: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub html: String,
}

/// Applies parsed rows through [`ProductService`], so imported products get
/// the same validation and search indexing as hand-made ones.
pub struct Importer<'a> {
    products: ProductService<'a>,
    product_repo: ProductRepository<'a>,
    categories: CategoryRepository<'a>,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, search: &'a SearchClient) -> Self {
        Self {
            products: ProductService::new(pool, search),
            product_repo: ProductRepository::new(pool),
            categories: CategoryRepository::new(pool),
        }
    }

    /// Parse `html` and apply every row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the table itself is unusable.
    /// Row-level failures are reported in the result instead.
    #[instrument(skip(self, html), fields(bytes = html.len()))]
    pub async fn import_html(&self, html: &str) -> Result<ImportReport, AppError> {
        let parsed = parse_table(html, MAX_ROWS)?;
        let mut report = self.run(parsed.rows).await;
        report.errors.extend(parsed.errors);
        report.errors.sort_by_key(|e| e.row);
        report.skipped_before_header = parsed.skipped;
        if parsed.skipped > 0 {
            tracing::warn!(skipped = parsed.skipped, "Rows above the table header were not imported");
        }
        tracing::info!(
            created = report.created.len(),
            updated = report.updated.len(),
            errors = report.errors.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Upsert each row, collecting per-row outcomes.
    pub async fn run(&self, rows: Vec<ImportRow>) -> ImportReport {
        let mut report = ImportReport::default();
        for row in rows {
            let number = row.row;
            match self.apply(row).await {
                Ok((product, created)) => {
                    let entry = ImportedProduct {
                        row: number,
                        id: product.id,
                        name: product.name,
                    };
                    if created {
                        report.created.push(entry);
                    } else {
                        report.updated.push(entry);
                    }
                }
                Err(err) => {
                    tracing::debug!(row = number, error = %err, "Import row rejected");
                    report.errors.push(RowError {
                        row: number,
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Returns the product and whether it was created.
    async fn apply(&self, row: ImportRow) -> Result<(Product, bool), AppError> {
        let category_id = match row.category.as_deref() {
            Some(needle) => Some(
                self.categories
                    .find_id_by_slug_or_name(needle)
                    .await?
                    .ok_or_else(|| AppError::bad_request(format!("unknown category '{needle}'")))?,
            ),
            None => None,
        };

        if let Some(existing) = self.find_existing(&row).await? {
            let patch = ProductPatch {
                name: Some(row.name),
                price: Some(row.price),
                compare_at_price: row.compare_at_price.map(Some),
                stock: row.stock,
                category_id: category_id.map(Some),
                description: row.description.map(Some),
                ..ProductPatch::default()
            };
            let product = self.products.update(existing, patch).await?;
            return Ok((product, false));
        }

        let product = self
            .products
            .create(ProductInput {
                name: row.name,
                slug: None,
                sku: row.sku,
                description: row.description,
                price: row.price,
                compare_at_price: row.compare_at_price,
                stock: row.stock.unwrap_or(0),
                category_id,
                images: Vec::new(),
                is_active: true,
            })
            .await?;
        Ok((product, true))
    }

    async fn find_existing(&self, row: &ImportRow) -> Result<Option<ProductId>, AppError> {
        if let Some(sku) = row.sku.as_deref() {
            return Ok(self.product_repo.get_by_sku(sku).await?.map(|p| p.id));
        }
        let Ok(slug) = Slug::from_title(&row.name) else {
            return Ok(None);
        };
        Ok(self.product_repo.get_by_slug(&slug).await?.map(|p| p.id))
    }
}
