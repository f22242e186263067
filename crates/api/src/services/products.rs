//! Catalog product management.

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{CategoryId, Money, ProductId, Slug};

use super::resolve_slug;
use crate::db::products::ProductRecord;
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::models::product::{
    BulkPriceRequest, BulkPriceResult, Product, ProductFilter, ProductInput, ProductPatch,
    ReindexResult, SearchEngine, SearchResults,
};
use crate::models::{Paginated, Pagination, optional_text, require_text};
use crate::search::SearchClient;

const MAX_NAME_LENGTH: usize = 200;
const MAX_SKU_LENGTH: usize = 64;
const MAX_IMAGES: usize = 20;
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const MAX_SEARCH_LIMIT: u32 = 100;

pub struct ProductService<'a> {
    pool: &'a PgPool,
    products: ProductRepository<'a>,
    categories: CategoryRepository<'a>,
    search: &'a SearchClient,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, search: &'a SearchClient) -> Self {
        Self {
            pool,
            products: ProductRepository::new(pool),
            categories: CategoryRepository::new(pool),
            search,
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an inverted price range.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> Result<Paginated<Product>, AppError> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
            && min > max
        {
            return Err(AppError::bad_request("minPrice cannot exceed maxPrice"));
        }
        let (items, total) = self.products.list(filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Inactive products are hidden unless `include_inactive`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    pub async fn get(&self, id: ProductId, include_inactive: bool) -> Result<Product, AppError> {
        self.products
            .get_by_id(id)
            .await?
            .filter(|p| include_inactive || p.is_active)
            .ok_or_else(|| AppError::not_found("Product"))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Product, AppError> {
        let slug = Slug::parse(slug).map_err(|_| AppError::not_found("Product"))?;
        self.products
            .get_by_slug(&slug)
            .await?
            .filter(|p| include_inactive || p.is_active)
            .ok_or_else(|| AppError::not_found("Product"))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields or an unknown
    /// category, `AppError::Conflict` for a taken slug or SKU.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: ProductInput) -> Result<Product, AppError> {
        let name = require_text("name", &input.name, MAX_NAME_LENGTH).map_err(AppError::BadRequest)?;
        let sku = normalize_sku(input.sku.as_deref())?;
        validate_pricing(input.price, input.compare_at_price)?;
        validate_stock(input.stock)?;
        let images = normalize_images(input.images)?;
        if let Some(category) = input.category_id {
            self.require_category(category).await?;
        }
        if let Some(sku) = sku.as_deref()
            && self.products.sku_exists(sku, None).await?
        {
            return Err(AppError::conflict(format!("SKU '{sku}' already exists")));
        }

        let repo = &self.products;
        let slug = resolve_slug(input.slug, &name, |s| async move {
            repo.slug_exists(&s, None).await
        })
        .await?;

        let description = optional_text(input.description.as_deref());
        let product = self
            .products
            .create(&ProductRecord {
                name: &name,
                slug: &slug,
                sku: sku.as_deref(),
                description: description.as_deref(),
                price: input.price,
                compare_at_price: input.compare_at_price,
                stock: input.stock,
                category_id: input.category_id,
                images: &images,
                is_active: input.is_active,
            })
            .await?;

        tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
        self.search.index_product(&product).await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Same as [`Self::create`], plus `AppError::NotFound`.
    #[instrument(skip(self, patch), fields(product_id = %id))]
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> Result<Product, AppError> {
        let current = self.get(id, true).await?;

        let name = match patch.name.as_deref() {
            Some(name) => require_text("name", name, MAX_NAME_LENGTH).map_err(AppError::BadRequest)?,
            None => current.name.clone(),
        };

        let slug = match patch.slug {
            Some(slug) if slug != current.slug => {
                if self.products.slug_exists(&slug, Some(id)).await? {
                    return Err(AppError::conflict(format!("slug '{slug}' already exists")));
                }
                slug
            }
            _ => current.slug.clone(),
        };

        let sku = match patch.sku {
            Some(sku) => normalize_sku(sku.as_deref())?,
            None => current.sku.clone(),
        };
        if let Some(sku) = sku.as_deref()
            && current.sku.as_deref() != Some(sku)
            && self.products.sku_exists(sku, Some(id)).await?
        {
            return Err(AppError::conflict(format!("SKU '{sku}' already exists")));
        }

        let price = patch.price.unwrap_or(current.price);
        let compare_at_price = patch.compare_at_price.unwrap_or(current.compare_at_price);
        validate_pricing(price, compare_at_price)?;
        let stock = patch.stock.unwrap_or(current.stock);
        validate_stock(stock)?;

        let category_id = patch.category_id.unwrap_or(current.category_id);
        if let Some(category) = category_id
            && Some(category) != current.category_id
        {
            self.require_category(category).await?;
        }

        let images = match patch.images {
            Some(images) => normalize_images(images)?,
            None => current.images.clone(),
        };
        let description = patch
            .description
            .map_or(current.description, |d| optional_text(d.as_deref()));

        let product = self
            .products
            .update(
                id,
                &ProductRecord {
                    name: &name,
                    slug: &slug,
                    sku: sku.as_deref(),
                    description: description.as_deref(),
                    price,
                    compare_at_price,
                    stock,
                    category_id,
                    images: &images,
                    is_active: patch.is_active.unwrap_or(current.is_active),
                },
            )
            .await?;

        self.search.index_product(&product).await;
        Ok(product)
    }

    /// Hard delete.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), AppError> {
        self.products.delete(id).await?;
        self.search.remove_product(id).await;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Reprice many products at once. Either every price changes or none.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when no target is given, the adjustment
    /// is out of bounds, or any product would end up with a negative or
    /// oversized price.
    #[instrument(skip(self, request))]
    pub async fn bulk_price_update(
        &self,
        request: &BulkPriceRequest,
    ) -> Result<BulkPriceResult, AppError> {
        if request.product_ids.is_empty() && request.category_id.is_none() {
            return Err(AppError::bad_request(
                "provide productIds or categoryId to select products",
            ));
        }
        request.check_bounds().map_err(AppError::bad_request)?;
        let adjustment = request.adjustment();

        let mut tx = self.pool.begin().await?;
        let locked =
            ProductRepository::lock_for_repricing(&mut tx, &request.product_ids, request.category_id)
                .await?;

        for product in &locked {
            let next = product.price.apply(adjustment).map_err(|e| {
                AppError::bad_request(format!("product {} ({}): {e}", product.id, product.name))
            })?;
            ProductRepository::set_price(&mut tx, product.id, next).await?;
        }
        tx.commit().await?;

        let updated = locked.len() as u64;
        tracing::info!(updated, ?adjustment, "Bulk price update applied");

        let ids: Vec<ProductId> = locked.iter().map(|p| p.id).collect();
        if self.search.is_available() {
            for product in self.products.get_many(&ids, true).await? {
                self.search.index_product(&product).await;
            }
        }
        Ok(BulkPriceResult { updated })
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank URL or a full gallery.
    pub async fn add_image(&self, id: ProductId, url: &str) -> Result<Product, AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::bad_request("url cannot be empty"));
        }
        let product = self.get(id, true).await?;
        if product.images.len() >= MAX_IMAGES && !product.images.iter().any(|i| i == url) {
            return Err(AppError::bad_request(format!(
                "a product can have at most {MAX_IMAGES} images"
            )));
        }
        self.products.add_image(id, url).await?;
        self.get(id, true).await
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    pub async fn remove_image(&self, id: ProductId, url: &str) -> Result<Product, AppError> {
        self.products.remove_image(id, url.trim()).await?;
        self.get(id, true).await
    }

    /// Full-text search over active products.
    ///
    /// Elasticsearch ranks the hits when it is reachable; otherwise the
    /// database answers with a name/SKU substring match.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank query.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: Option<u32>) -> Result<SearchResults, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::bad_request("q cannot be empty"));
        }
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        if let Some(ids) = self.search.search(query, limit).await {
            let found = self.products.get_many(&ids, false).await?;
            return Ok(SearchResults {
                engine: SearchEngine::Elasticsearch,
                items: in_rank_order(&ids, found),
            });
        }

        let filter = ProductFilter {
            search: Some(query.to_owned()),
            ..ProductFilter::default()
        };
        let page = Pagination { page: 1, limit };
        let (items, _) = self.products.list(&filter, page).await?;
        Ok(SearchResults {
            engine: SearchEngine::Database,
            items,
        })
    }

    /// Push every active product to the search index.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` when search is disabled or unreachable.
    #[instrument(skip(self))]
    pub async fn reindex(&self) -> Result<ReindexResult, AppError> {
        let products = self.products.list_all_active().await?;
        let indexed = self.search.bulk_index(&products).await?;
        tracing::info!(indexed, "Search index rebuilt");
        Ok(ReindexResult { indexed })
    }

    async fn require_category(&self, id: CategoryId) -> Result<(), AppError> {
        if self.categories.get_by_id(id).await?.is_none() {
            return Err(AppError::bad_request(format!("category {id} does not exist")));
        }
        Ok(())
    }
}

/// Reorder database rows to match search ranking, dropping ids the database
/// no longer has (deleted or deactivated since indexing).
fn in_rank_order(ranked: &[ProductId], found: Vec<Product>) -> Vec<Product> {
    let mut by_id: std::collections::HashMap<ProductId, Product> =
        found.into_iter().map(|p| (p.id, p)).collect();
    ranked.iter().filter_map(|id| by_id.remove(id)).collect()
}

fn normalize_sku(sku: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(sku) = optional_text(sku) else {
        return Ok(None);
    };
    if sku.chars().count() > MAX_SKU_LENGTH {
        return Err(AppError::bad_request(format!(
            "sku must be at most {MAX_SKU_LENGTH} characters"
        )));
    }
    Ok(Some(sku))
}

/// A compare-at ("was") price below the selling price makes no sense.
pub(crate) fn validate_pricing(price: Money, compare_at: Option<Money>) -> Result<(), AppError> {
    if let Some(compare_at) = compare_at
        && compare_at < price
    {
        return Err(AppError::bad_request(format!(
            "compareAtPrice ({compare_at}) cannot be lower than price ({price})"
        )));
    }
    Ok(())
}

pub(crate) fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::bad_request("stock cannot be negative"));
    }
    Ok(())
}

fn normalize_images(images: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut out: Vec<String> = Vec::with_capacity(images.len());
    for image in images {
        let image = image.trim().to_owned();
        if !image.is_empty() && !out.contains(&image) {
            out.push(image);
        }
    }
    if out.len() > MAX_IMAGES {
        return Err(AppError::bad_request(format!(
            "a product can have at most {MAX_IMAGES} images"
        )));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(cents: i64) -> Money {
        Money::from_cents(cents).unwrap()
    }

    #[test]
    fn test_compare_at_must_not_undercut_price() {
        assert!(validate_pricing(money(1000), Some(money(1200))).is_ok());
        assert!(validate_pricing(money(1000), Some(money(1000))).is_ok());
        assert!(validate_pricing(money(1000), None).is_ok());
        assert!(matches!(
            validate_pricing(money(1000), Some(money(999))),
            Err(AppError::BadRequest(_))
        ));
    }

    fn product(id: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: Slug::parse(&format!("product-{id}")).unwrap(),
            sku: None,
            description: None,
            price: money(100),
            compare_at_price: None,
            stock: 1,
            category_id: None,
            category_name: None,
            images: Vec::new(),
            is_active: true,
            rating_avg: rust_decimal::Decimal::ZERO,
            rating_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_search_hits_keep_rank_order() {
        let ranked = [ProductId::new(3), ProductId::new(1), ProductId::new(7), ProductId::new(2)];
        let found = vec![product(1), product(2), product(3)];
        let ids: Vec<i32> = in_rank_order(&ranked, found)
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_negative_stock_rejected() {
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_sku_normalization() {
        assert_eq!(normalize_sku(Some("  AB-1 ")).unwrap().as_deref(), Some("AB-1"));
        assert_eq!(normalize_sku(Some("   ")).unwrap(), None);
        assert!(normalize_sku(Some(&"X".repeat(65))).is_err());
    }

    #[test]
    fn test_images_deduplicated() {
        let images = normalize_images(vec![
            "/uploads/products/a.png".into(),
            " /uploads/products/a.png ".into(),
            String::new(),
            "/uploads/products/b.png".into(),
        ])
        .unwrap();
        assert_eq!(images.len(), 2);
    }
}
