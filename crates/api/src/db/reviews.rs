//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use emporium_core::{ProductId, ReviewId, ReviewStatus, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Pagination;
use crate::models::review::{Review, ReviewFilter};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.name AS author_name, r.rating, r.title, r.body,
           r.status, r.is_verified_purchase, r.created_at, r.updated_at
    FROM reviews r
    JOIN users u ON u.id = r.user_id";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    author_name: String,
    rating: i16,
    title: Option<String>,
    body: String,
    status: ReviewStatus,
    is_verified_purchase: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            author_name: row.author_name,
            rating: row.rating,
            title: row.title,
            body: row.body,
            status: row.status,
            is_verified_purchase: row.is_verified_purchase,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Values for a new review.
#[derive(Debug)]
pub struct NewReview<'r> {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub title: Option<&'r str>,
    pub body: &'r str,
    pub is_verified_purchase: bool,
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews filtered by status and product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        page: Pagination,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        const WHERE: &str = r"
            WHERE ($1::review_status IS NULL OR r.status = $1)
              AND ($2::int IS NULL OR r.product_id = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reviews r {WHERE}"))
            .bind(filter.status)
            .bind(filter.product_id)
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "{REVIEW_SELECT} {WHERE} ORDER BY r.created_at DESC, r.id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status)
        .bind(filter.product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(&self, review: &NewReview<'_>) -> Result<Review, RepositoryError> {
        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO reviews (product_id, user_id, rating, title, body, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(review.title)
        .bind(review.body)
        .bind(review.is_verified_purchase)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("you have already reviewed this product"))?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Set the moderation status; returns the product and author.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: ReviewId,
        status: ReviewStatus,
    ) -> Result<(ProductId, UserId), RepositoryError> {
        let row: Option<(ProductId, UserId)> = sqlx::query_as(
            r"
            UPDATE reviews SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING product_id, user_id
            ",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(conn)
        .await?;
        row.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review; returns its product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(conn: &mut PgConnection, id: ReviewId) -> Result<ProductId, RepositoryError> {
        let product: Option<ProductId> =
            sqlx::query_scalar("DELETE FROM reviews WHERE id = $1 RETURNING product_id")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        product.ok_or(RepositoryError::NotFound)
    }
}
