//! Database access for the store's `PostgreSQL` schema.
//!
//! # Tables
//!
//! - `users` - Accounts of customers and staff
//! - `categories`, `products` - Catalog
//! - `orders`, `order_items`, `order_status_history` - Orders
//! - `blog_posts` - Blog
//! - `hero_blocks`, `footer_blocks`, `navigation_items`, `advantages` - CMS
//! - `reviews` - Product reviews
//! - `support_conversations`, `support_messages` - Support chat
//! - `notifications` - In-app notifications
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow` rows), so
//! the crate builds without a live database or an offline query cache.
//! Repositories borrow the pool; steps that must share a transaction are
//! associated functions taking `&mut PgConnection`.

pub mod blog;
pub mod categories;
pub mod cms;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod support;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use emporium_core::{Email, Slug};

pub use blog::BlogRepository;
pub use categories::CategoryRepository;
pub use cms::CmsRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use support::SupportRepository;
pub use users::UserRepository;

/// Schema migrations embedded from `crates/api/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug).
    #[error("{0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
pub(crate) fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Map a foreign key violation to [`RepositoryError::Conflict`] with `message`.
pub(crate) fn conflict_on_foreign_key(
    message: &'static str,
) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

pub(crate) fn parse_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

pub(crate) fn parse_slug(raw: &str) -> Result<Slug, RepositoryError> {
    Slug::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid slug in database: {e}")))
}

/// `%term%` for `ILIKE`, with the wildcard characters in `term` escaped.
/// Blank terms yield `None` so the filter is skipped.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

/// Fail with [`RepositoryError::NotFound`] when an update or delete touched no rows.
pub(crate) const fn expect_affected(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("50%_off")).as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(like_pattern(Some("  kettle ")).as_deref(), Some("%kettle%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }

    #[test]
    fn test_expect_affected() {
        assert!(matches!(expect_affected(0), Err(RepositoryError::NotFound)));
        assert!(expect_affected(2).is_ok());
    }
}
