//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use emporium_core::{CategoryId, Money, ProductId, Slug};

use super::{RepositoryError, conflict_on_unique, expect_affected, like_pattern, parse_slug};
use crate::models::Pagination;
use crate::models::product::{Product, ProductFilter};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.sku, p.description, p.price, p.compare_at_price,
           p.stock, p.category_id, c.name AS category_name, p.images, p.is_active,
           p.rating_avg, p.rating_count, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id";

const FILTER_WHERE: &str = r"
    WHERE ($1 OR p.is_active)
      AND ($2::int IS NULL OR p.category_id = $2)
      AND ($3::text IS NULL OR p.name ILIKE $3 OR p.sku ILIKE $3)
      AND ($4::numeric IS NULL OR p.price >= $4)
      AND ($5::numeric IS NULL OR p.price <= $5)
      AND ($6::bool IS NULL OR (p.stock > 0) = $6)";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    sku: Option<String>,
    description: Option<String>,
    price: Money,
    compare_at_price: Option<Money>,
    stock: i32,
    category_id: Option<i32>,
    category_name: Option<String>,
    images: Vec<String>,
    is_active: bool,
    rating_avg: Decimal,
    rating_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: parse_slug(&row.slug)?,
            sku: row.sku,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            stock: row.stock,
            category_id: row.category_id.map(CategoryId::new),
            category_name: row.category_name,
            images: row.images,
            is_active: row.is_active,
            rating_avg: row.rating_avg,
            rating_count: row.rating_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A product row locked for an order or a stock change.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i32,
    pub is_active: bool,
}

/// Column values for insert and full update.
#[derive(Debug)]
pub struct ProductRecord<'r> {
    pub name: &'r str,
    pub slug: &'r Slug,
    pub sku: Option<&'r str>,
    pub description: Option<&'r str>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub images: &'r [String],
    pub is_active: bool,
}

fn collect(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted page of products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products p {FILTER_WHERE}"
        ))
        .bind(filter.include_inactive)
        .bind(filter.category_id)
        .bind(search.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.in_stock)
        .fetch_one(self.pool)
        .await?;

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} {FILTER_WHERE} ORDER BY {} LIMIT $7 OFFSET $8",
            filter.sort.order_by()
        ))
        .bind(filter.include_inactive)
        .bind(filter.category_id)
        .bind(search.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.in_stock)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((collect(rows)?, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.slug = $1"))
                .bind(slug)
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.sku = $1"))
            .bind(sku)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Products with the given ids, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        ids: &[ProductId],
        include_inactive: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} WHERE p.id = ANY($1) AND ($2 OR p.is_active)"
        ))
        .bind(ids)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        collect(rows)
    }

    /// Every active product, for rebuilding the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.is_active ORDER BY p.id"))
                .fetch_all(self.pool)
                .await?;

        collect(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(
        &self,
        slug: &Slug,
        except: Option<ProductId>,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sku_exists(
        &self,
        sku: &str,
        except: Option<ProductId>,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE sku = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(sku)
        .bind(except)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    #[instrument(skip(self, record), fields(slug = %record.slug))]
    pub async fn create(&self, record: &ProductRecord<'_>) -> Result<Product, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO products
                (name, slug, sku, description, price, compare_at_price, stock,
                 category_id, images, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(record.name)
        .bind(record.slug)
        .bind(record.sku)
        .bind(record.description)
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(record.stock)
        .bind(record.category_id)
        .bind(record.images)
        .bind(record.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("product slug or SKU already exists"))?;

        self.get_by_id(ProductId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Overwrite every editable column.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    #[instrument(skip(self, record), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: ProductId,
        record: &ProductRecord<'_>,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET
                name = $2, slug = $3, sku = $4, description = $5, price = $6,
                compare_at_price = $7, stock = $8, category_id = $9, images = $10,
                is_active = $11, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(record.name)
        .bind(record.slug)
        .bind(record.sku)
        .bind(record.description)
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(record.stock)
        .bind(record.category_id)
        .bind(record.images)
        .bind(record.is_active)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("product slug or SKU already exists"))?;
        expect_affected(result.rows_affected())?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Hard delete. Order items keep their snapshot and lose the link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        expect_affected(result.rows_affected())
    }

    /// Append an image URL unless it is already present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_image(&self, id: ProductId, url: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET
                images = CASE WHEN $2 = ANY(images) THEN images ELSE array_append(images, $2) END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(url)
        .execute(self.pool)
        .await?;

        expect_affected(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn remove_image(&self, id: ProductId, url: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET images = array_remove(images, $2), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(url)
        .execute(self.pool)
        .await?;

        expect_affected(result.rows_affected())
    }

    // =========================================================================
    // Transactional steps
    // =========================================================================

    /// Lock the given products for the rest of the transaction.
    ///
    /// Rows are locked in id order so concurrent orders cannot deadlock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        ids: &[ProductId],
    ) -> Result<Vec<LockedProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LockedProduct>(
            r"
            SELECT id, name, price, stock, is_active
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(ids)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Lock products for a bulk price change, by id list or by category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_repricing(
        conn: &mut PgConnection,
        ids: &[ProductId],
        category: Option<CategoryId>,
    ) -> Result<Vec<LockedProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LockedProduct>(
            r"
            SELECT id, name, price, stock, is_active
            FROM products
            WHERE id = ANY($1) OR ($2::int IS NOT NULL AND category_id = $2)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(ids)
        .bind(category)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_price(
        conn: &mut PgConnection,
        id: ProductId,
        price: Money,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET price = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(price)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Add `delta` (negative to take) to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, including the
    /// check constraint when stock would drop below zero.
    pub async fn adjust_stock(
        conn: &mut PgConnection,
        id: ProductId,
        delta: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Recompute `rating_avg` and `rating_count` from approved reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn refresh_rating(
        conn: &mut PgConnection,
        id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE products p SET
                rating_avg = COALESCE(agg.avg, 0),
                rating_count = agg.count
            FROM (
                SELECT ROUND(AVG(rating)::numeric, 2) AS avg, COUNT(*)::int AS count
                FROM reviews
                WHERE product_id = $1 AND status = 'APPROVED'
            ) agg
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
