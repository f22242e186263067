//! Business logic layer.
//!
//! Services validate input, enforce the store's rules and coordinate
//! repositories, wrapping multi-row changes in a single transaction.

pub mod auth;
pub mod blog;
pub mod categories;
pub mod cms;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod support;
pub mod uploads;
pub mod users;

use std::future::Future;

use emporium_core::Slug;

use crate::db::RepositoryError;
use crate::error::AppError;

const MAX_SLUG_SUFFIX: u32 = 50;

/// Pick the slug for a new or renamed record.
///
/// An explicit slug must be free (409 otherwise). A slug derived from
/// `source` gets `-2`, `-3`, ... appended until it is free.
pub(crate) async fn resolve_slug<F, Fut>(
    explicit: Option<Slug>,
    source: &str,
    exists: F,
) -> Result<Slug, AppError>
where
    F: Fn(Slug) -> Fut,
    Fut: Future<Output = Result<bool, RepositoryError>>,
{
    if let Some(slug) = explicit {
        if exists(slug.clone()).await? {
            return Err(AppError::conflict(format!("slug '{slug}' already exists")));
        }
        return Ok(slug);
    }

    let base = Slug::from_title(source)?;
    if !exists(base.clone()).await? {
        return Ok(base);
    }
    for n in 2..=MAX_SLUG_SUFFIX {
        let candidate = base.with_suffix(n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::conflict(format!("slug '{base}' already exists")))
}

/// Name the missing entity instead of the generic "Resource not found".
pub(crate) fn not_found_as(what: &str, err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::not_found(what),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn taken(slugs: &[&str], candidate: Slug) -> Result<bool, RepositoryError> {
        Ok(slugs.contains(&candidate.as_str()))
    }

    #[tokio::test]
    async fn test_explicit_slug_conflict() {
        let err = resolve_slug(Some(Slug::parse("kettle").unwrap()), "Kettle", |s| {
            taken(&["kettle"], s)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_derived_slug_gets_suffix() {
        let slug = resolve_slug(None, "Tea Kettle", |s| taken(&["tea-kettle", "tea-kettle-2"], s))
            .await
            .unwrap();
        assert_eq!(slug.as_str(), "tea-kettle-3");
    }

    #[tokio::test]
    async fn test_untitled_source_is_bad_request() {
        let err = resolve_slug(None, "!!!", |s| taken(&[], s)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
