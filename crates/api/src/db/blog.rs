//! Blog post repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{BlogPostId, PostStatus, Slug, UserId};

use super::{RepositoryError, conflict_on_unique, expect_affected, parse_slug};
use crate::models::Pagination;
use crate::models::blog::BlogPost;

const POST_SELECT: &str = r"
    SELECT b.id, b.title, b.slug, b.excerpt, b.content, b.cover_image, b.tags, b.status,
           b.author_id, u.name AS author_name, b.published_at, b.views,
           b.created_at, b.updated_at
    FROM blog_posts b
    LEFT JOIN users u ON u.id = b.author_id";

#[derive(Debug, sqlx::FromRow)]
struct BlogPostRow {
    id: i32,
    title: String,
    slug: String,
    excerpt: Option<String>,
    content: String,
    cover_image: Option<String>,
    tags: Vec<String>,
    status: PostStatus,
    author_id: Option<i32>,
    author_name: Option<String>,
    published_at: Option<DateTime<Utc>>,
    views: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BlogPostRow> for BlogPost {
    type Error = RepositoryError;

    fn try_from(row: BlogPostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BlogPostId::new(row.id),
            title: row.title,
            slug: parse_slug(&row.slug)?,
            excerpt: row.excerpt,
            content: row.content,
            cover_image: row.cover_image,
            tags: row.tags,
            status: row.status,
            author_id: row.author_id.map(UserId::new),
            author_name: row.author_name,
            published_at: row.published_at,
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column values for insert and full update.
#[derive(Debug)]
pub struct BlogPostRecord<'r> {
    pub title: &'r str,
    pub slug: &'r Slug,
    pub excerpt: Option<&'r str>,
    pub content: &'r str,
    pub cover_image: Option<&'r str>,
    pub tags: &'r [String],
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

/// Repository for blog post database operations.
pub struct BlogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BlogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Posts filtered by status and tag, newest first.
    ///
    /// Published posts sort by `published_at`, the rest by creation time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PostStatus>,
        tag: Option<&str>,
        page: Pagination,
    ) -> Result<(Vec<BlogPost>, i64), RepositoryError> {
        const WHERE: &str = r"
            WHERE ($1::post_status IS NULL OR b.status = $1)
              AND ($2::text IS NULL OR $2 = ANY(b.tags))";

        let tag = tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM blog_posts b {WHERE}"))
            .bind(status)
            .bind(tag.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<BlogPostRow> = sqlx::query_as(&format!(
            r"
            {POST_SELECT} {WHERE}
            ORDER BY COALESCE(b.published_at, b.created_at) DESC, b.id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(status)
        .bind(tag.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let posts = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, _>>()?;
        Ok((posts, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: BlogPostId) -> Result<Option<BlogPost>, RepositoryError> {
        let row: Option<BlogPostRow> = sqlx::query_as(&format!("{POST_SELECT} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Fetch a published post and count the view in the same statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn view_published(&self, slug: &Slug) -> Result<Option<BlogPost>, RepositoryError> {
        let row: Option<BlogPostRow> = sqlx::query_as(
            r"
            WITH viewed AS (
                UPDATE blog_posts SET views = views + 1
                WHERE slug = $1 AND status = 'PUBLISHED'
                RETURNING *
            )
            SELECT b.id, b.title, b.slug, b.excerpt, b.content, b.cover_image, b.tags, b.status,
                   b.author_id, u.name AS author_name, b.published_at, b.views,
                   b.created_at, b.updated_at
            FROM viewed b
            LEFT JOIN users u ON u.id = b.author_id
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(
        &self,
        slug: &Slug,
        except: Option<BlogPostId>,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM blog_posts WHERE slug = $1 AND ($2::int IS NULL OR id <> $2))",
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
    pub async fn create(
        &self,
        author: UserId,
        record: &BlogPostRecord<'_>,
    ) -> Result<BlogPost, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO blog_posts
                (title, slug, excerpt, content, cover_image, tags, status, published_at, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(record.title)
        .bind(record.slug)
        .bind(record.excerpt)
        .bind(record.content)
        .bind(record.cover_image)
        .bind(record.tags)
        .bind(record.status)
        .bind(record.published_at)
        .bind(author)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("blog post slug already exists"))?;

        self.get_by_id(BlogPostId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    #[instrument(skip(self, record), fields(post_id = %id))]
    pub async fn update(
        &self,
        id: BlogPostId,
        record: &BlogPostRecord<'_>,
    ) -> Result<BlogPost, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE blog_posts SET
                title = $2, slug = $3, excerpt = $4, content = $5, cover_image = $6,
                tags = $7, status = $8, published_at = $9, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(record.title)
        .bind(record.slug)
        .bind(record.excerpt)
        .bind(record.content)
        .bind(record.cover_image)
        .bind(record.tags)
        .bind(record.status)
        .bind(record.published_at)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("blog post slug already exists"))?;
        expect_affected(result.rows_affected())?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn delete(&self, id: BlogPostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        expect_affected(result.rows_affected())
    }
}
