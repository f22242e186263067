//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{CategoryId, Slug};

use super::{RepositoryError, conflict_on_unique, expect_affected, parse_slug};
use crate::models::category::Category;

const CATEGORY_SELECT: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.image_url, c.parent_id,
           c.sort_order, c.is_active, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count
    FROM categories c";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    parent_id: Option<i32>,
    sort_order: i32,
    is_active: bool,
    product_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: parse_slug(&row.slug)?,
            description: row.description,
            image_url: row.image_url,
            parent_id: row.parent_id.map(CategoryId::new),
            sort_order: row.sort_order,
            is_active: row.is_active,
            product_count: row.product_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column values for insert and full update.
#[derive(Debug)]
pub struct CategoryRecord<'r> {
    pub name: &'r str,
    pub slug: &'r Slug,
    pub description: Option<&'r str>,
    pub image_url: Option<&'r str>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered by `sort_order, name`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "{CATEGORY_SELECT} WHERE $1 OR c.is_active ORDER BY c.sort_order, c.name"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("{CATEGORY_SELECT} WHERE c.slug = $1"))
                .bind(slug)
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Look up a category by slug or, failing that, by exact name
    /// (case-insensitive). Used by the bulk importer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_id_by_slug_or_name(
        &self,
        needle: &str,
    ) -> Result<Option<CategoryId>, RepositoryError> {
        let id: Option<i32> = sqlx::query_scalar(
            r"
            SELECT id FROM categories
            WHERE slug = lower($1) OR lower(name) = lower($1)
            ORDER BY (slug = lower($1)) DESC
            LIMIT 1
            ",
        )
        .bind(needle.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(CategoryId::new))
    }

    /// Ids of every ancestor of `id`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ancestors(&self, id: CategoryId) -> Result<Vec<CategoryId>, RepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r"
            WITH RECURSIVE chain(id, parent_id, depth) AS (
                SELECT id, parent_id, 0 FROM categories WHERE id = $1
                UNION ALL
                SELECT c.id, c.parent_id, chain.depth + 1
                FROM categories c JOIN chain ON c.id = chain.parent_id
                WHERE chain.depth < 64
            )
            SELECT id FROM chain WHERE depth > 0 ORDER BY depth
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().map(CategoryId::new).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(
        &self,
        slug: &Slug,
        except: Option<CategoryId>,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, record), fields(slug = %record.slug))]
    pub async fn create(&self, record: &CategoryRecord<'_>) -> Result<Category, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO categories (name, slug, description, image_url, parent_id, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(record.name)
        .bind(record.slug)
        .bind(record.description)
        .bind(record.image_url)
        .bind(record.parent_id)
        .bind(record.sort_order)
        .bind(record.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?;

        self.get_by_id(CategoryId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Overwrite every editable column.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    #[instrument(skip(self, record), fields(category_id = %id))]
    pub async fn update(
        &self,
        id: CategoryId,
        record: &CategoryRecord<'_>,
    ) -> Result<Category, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE categories SET
                name = $2, slug = $3, description = $4, image_url = $5,
                parent_id = $6, sort_order = $7, is_active = $8, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(record.name)
        .bind(record.slug)
        .bind(record.description)
        .bind(record.image_url)
        .bind(record.parent_id)
        .bind(record.sort_order)
        .bind(record.is_active)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?;
        expect_affected(result.rows_affected())?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Number of direct children.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn child_count(&self, id: CategoryId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE parent_id = $1")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if something still references it.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(super::conflict_on_foreign_key("category is still in use"))?;

        expect_affected(result.rows_affected())
    }
}
