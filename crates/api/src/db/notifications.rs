//! Notification repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use emporium_core::{NotificationId, NotificationKind, Role, UserId};

use super::{RepositoryError, expect_affected};
use crate::models::Pagination;
use crate::models::notification::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, link, read_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    user_id: UserId,
    kind: NotificationKind,
    title: String,
    body: String,
    link: Option<String>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            link: row.link,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user: UserId,
        unread_only: bool,
        page: Pagination,
    ) -> Result<(Vec<Notification>, i64), RepositoryError> {
        const WHERE: &str = "WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications {WHERE}"))
            .bind(user)
            .bind(unread_only)
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications {WHERE} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user)
        .bind(unread_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one of `user`'s notifications read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist or belongs to
    /// someone else.
    pub async fn mark_read(&self, id: NotificationId, user: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, NOW()) WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .execute(self.pool)
        .await?;
        expect_affected(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist or belongs to
    /// someone else.
    pub async fn delete(&self, id: NotificationId, user: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(self.pool)
            .await?;
        expect_affected(result.rows_affected())
    }

    /// Insert a notification on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        conn: &mut PgConnection,
        notification: &NewNotification,
    ) -> Result<NotificationId, RepositoryError> {
        let id: NotificationId = sqlx::query_scalar(
            r"
            INSERT INTO notifications (user_id, kind, title, body, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.link.as_deref())
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// One `SYSTEM` notification per active user, optionally of one role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn broadcast(
        &self,
        title: &str,
        body: &str,
        link: Option<&str>,
        role: Option<Role>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO notifications (user_id, kind, title, body, link)
            SELECT id, 'SYSTEM', $1, $2, $3
            FROM users
            WHERE is_active AND ($4::user_role IS NULL OR role = $4)
            ",
        )
        .bind(title)
        .bind(body)
        .bind(link)
        .bind(role)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
