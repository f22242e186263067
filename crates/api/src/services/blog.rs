//! Blog posts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{BlogPostId, PostStatus, Slug, UserId};

use super::{not_found_as, resolve_slug};
use crate::db::BlogRepository;
use crate::db::blog::BlogPostRecord;
use crate::error::AppError;
use crate::models::blog::{BlogPost, BlogPostInput, BlogPostPatch, normalize_tags};
use crate::models::{Paginated, Pagination, optional_text, require_text};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_EXCERPT_LENGTH: usize = 500;
const MAX_TAGS: usize = 20;

pub struct BlogService<'a> {
    posts: BlogRepository<'a>,
}

impl<'a> BlogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            posts: BlogRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_published(
        &self,
        tag: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<BlogPost>, AppError> {
        let (items, total) = self
            .posts
            .list(Some(PostStatus::Published), tag, page)
            .await?;
        Ok(Paginated::new(items, total, page))
    }

    /// A published post by slug. Counts as a view.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown, draft and archived posts.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<BlogPost, AppError> {
        let slug = Slug::parse(slug).map_err(|_| AppError::not_found("Post"))?;
        self.posts
            .view_published(&slug)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<PostStatus>,
        page: Pagination,
    ) -> Result<Paginated<BlogPost>, AppError> {
        let (items, total) = self.posts.list(status, None, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the post does not exist.
    pub async fn get(&self, id: BlogPostId) -> Result<BlogPost, AppError> {
        self.posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields, `AppError::Conflict`
    /// for a taken slug.
    #[instrument(skip(self, input), fields(author = %author, title = %input.title))]
    pub async fn create(&self, author: UserId, input: BlogPostInput) -> Result<BlogPost, AppError> {
        let title =
            require_text("title", &input.title, MAX_TITLE_LENGTH).map_err(AppError::BadRequest)?;
        let content = require_content(&input.content)?;
        let excerpt = check_excerpt(input.excerpt.as_deref())?;
        let tags = check_tags(input.tags)?;

        let repo = &self.posts;
        let slug = resolve_slug(input.slug, &title, |s| async move {
            repo.slug_exists(&s, None).await
        })
        .await?;

        let cover_image = optional_text(input.cover_image.as_deref());
        let post = self
            .posts
            .create(
                author,
                &BlogPostRecord {
                    title: &title,
                    slug: &slug,
                    excerpt: excerpt.as_deref(),
                    content: &content,
                    cover_image: cover_image.as_deref(),
                    tags: &tags,
                    status: input.status,
                    published_at: published_at(None, input.status, Utc::now()),
                },
            )
            .await?;

        tracing::info!(post_id = %post.id, slug = %post.slug, status = ?post.status, "Blog post created");
        Ok(post)
    }

    /// # Errors
    ///
    /// Same as [`Self::create`], plus `AppError::NotFound`.
    #[instrument(skip(self, patch), fields(post_id = %id))]
    pub async fn update(&self, id: BlogPostId, patch: BlogPostPatch) -> Result<BlogPost, AppError> {
        let current = self.get(id).await?;

        let title = match patch.title.as_deref() {
            Some(title) => {
                require_text("title", title, MAX_TITLE_LENGTH).map_err(AppError::BadRequest)?
            }
            None => current.title,
        };
        let slug = match patch.slug {
            Some(slug) if slug != current.slug => {
                if self.posts.slug_exists(&slug, Some(id)).await? {
                    return Err(AppError::conflict(format!("slug '{slug}' already exists")));
                }
                slug
            }
            _ => current.slug,
        };
        let content = match patch.content.as_deref() {
            Some(content) => require_content(content)?,
            None => current.content,
        };
        let excerpt = match patch.excerpt {
            Some(value) => check_excerpt(value.as_deref())?,
            None => current.excerpt,
        };
        let cover_image = patch
            .cover_image
            .map_or(current.cover_image, |v| optional_text(v.as_deref()));
        let tags = match patch.tags {
            Some(values) => check_tags(values)?,
            None => current.tags,
        };
        let status = patch.status.unwrap_or(current.status);

        let post = self
            .posts
            .update(
                id,
                &BlogPostRecord {
                    title: &title,
                    slug: &slug,
                    excerpt: excerpt.as_deref(),
                    content: &content,
                    cover_image: cover_image.as_deref(),
                    tags: &tags,
                    status,
                    published_at: published_at(current.published_at, status, Utc::now()),
                },
            )
            .await?;

        if status != current.status {
            tracing::info!(post_id = %id, from = ?current.status, to = ?status, "Blog post status changed");
        }
        Ok(post)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the post does not exist.
    #[instrument(skip(self), fields(post_id = %id))]
    pub async fn delete(&self, id: BlogPostId) -> Result<(), AppError> {
        self.posts
            .delete(id)
            .await
            .map_err(|e| not_found_as("Post", e))?;
        tracing::info!(post_id = %id, "Blog post deleted");
        Ok(())
    }
}

/// `published_at` is stamped on the first publication and kept afterwards,
/// even if the post is archived or returned to draft.
fn published_at(
    current: Option<DateTime<Utc>>,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (current, status) {
        (Some(at), _) => Some(at),
        (None, PostStatus::Published) => Some(now),
        (None, _) => None,
    }
}

fn require_content(content: &str) -> Result<String, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::bad_request("content cannot be empty"));
    }
    Ok(content.to_owned())
}

fn check_excerpt(value: Option<&str>) -> Result<Option<String>, AppError> {
    let excerpt = optional_text(value);
    if excerpt
        .as_ref()
        .is_some_and(|e| e.chars().count() > MAX_EXCERPT_LENGTH)
    {
        return Err(AppError::bad_request(format!(
            "excerpt must be at most {MAX_EXCERPT_LENGTH} characters"
        )));
    }
    Ok(excerpt)
}

fn check_tags(values: Vec<String>) -> Result<Vec<String>, AppError> {
    let tags = normalize_tags(values);
    if tags.len() > MAX_TAGS {
        return Err(AppError::bad_request(format!(
            "a post can have at most {MAX_TAGS} tags"
        )));
    }
    Ok(tags)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_published_at_set_once() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let later = first + Duration::days(30);

        assert_eq!(published_at(None, PostStatus::Draft, first), None);
        assert_eq!(published_at(None, PostStatus::Published, first), Some(first));
        assert_eq!(
            published_at(Some(first), PostStatus::Published, later),
            Some(first)
        );
        assert_eq!(
            published_at(Some(first), PostStatus::Archived, later),
            Some(first)
        );
    }

    #[test]
    fn test_blank_content_rejected() {
        assert!(require_content(" \n ").is_err());
        assert_eq!(require_content("Hello").unwrap(), "Hello");
    }

    #[test]
    fn test_tag_limit() {
        let many: Vec<String> = (0..21).map(|i| format!("tag{i}")).collect();
        assert!(check_tags(many).is_err());
        assert_eq!(check_tags(vec!["A".into(), "a".into()]).unwrap(), vec!["a"]);
    }
}
