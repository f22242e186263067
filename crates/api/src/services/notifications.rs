//! In-app notifications.
//!
//! Other services raise notifications inside their own transactions through
//! [`notify`]; this service covers what the recipient does with them.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use emporium_core::{NotificationId, UserId};

use super::not_found_as;
use crate::db::NotificationRepository;
use crate::error::AppError;
use crate::models::notification::{BroadcastRequest, NewNotification, Notification};
use crate::models::{Paginated, Pagination, optional_text, require_text};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_BODY_LENGTH: usize = 2000;

pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(
        &self,
        user: UserId,
        unread_only: bool,
        page: Pagination,
    ) -> Result<Paginated<Notification>, AppError> {
        let (items, total) = self.notifications.list(user, unread_only, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn unread_count(&self, user: UserId) -> Result<i64, AppError> {
        Ok(self.notifications.unread_count(user).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` unless `user` owns the notification.
    pub async fn mark_read(&self, id: NotificationId, user: UserId) -> Result<(), AppError> {
        self.notifications
            .mark_read(id, user)
            .await
            .map_err(|e| not_found_as("Notification", e))
    }

    /// Returns how many were marked.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the update fails.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64, AppError> {
        Ok(self.notifications.mark_all_read(user).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` unless `user` owns the notification.
    pub async fn delete(&self, id: NotificationId, user: UserId) -> Result<(), AppError> {
        self.notifications
            .delete(id, user)
            .await
            .map_err(|e| not_found_as("Notification", e))
    }

    /// Send a `SYSTEM` notification to every active user, or every active
    /// user with `role`. Returns the number of recipients.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank title or body.
    #[instrument(skip(self, request), fields(role = ?request.role))]
    pub async fn broadcast(&self, request: &BroadcastRequest) -> Result<u64, AppError> {
        let title =
            require_text("title", &request.title, MAX_TITLE_LENGTH).map_err(AppError::BadRequest)?;
        let body =
            require_text("body", &request.body, MAX_BODY_LENGTH).map_err(AppError::BadRequest)?;
        let link = optional_text(request.link.as_deref());

        let sent = self
            .notifications
            .broadcast(&title, &body, link.as_deref(), request.role)
            .await?;
        tracing::info!(sent, "Broadcast notification sent");
        Ok(sent)
    }
}

/// Record a notification on the caller's transaction.
///
/// # Errors
///
/// Returns `AppError::Database` if the insert fails.
pub async fn notify(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> Result<NotificationId, AppError> {
    let id = NotificationRepository::insert(conn, notification).await?;
    tracing::debug!(
        notification_id = %id,
        user_id = %notification.user_id,
        kind = ?notification.kind,
        "Notification queued"
    );
    Ok(id)
}
