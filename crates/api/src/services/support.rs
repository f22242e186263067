//! Support chat between customers and support staff.
//!
//! A conversation is `OPEN` while it waits on staff and `PENDING` while it
//! waits on the customer. Each new message flips it accordingly; `CLOSED`
//! conversations accept no messages until staff reopen them.

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{ConversationId, ConversationStatus, NotificationKind, UserId};

use super::not_found_as;
use super::notifications::notify;
use crate::db::{SupportRepository, UserRepository};
use crate::error::AppError;
use crate::models::notification::NewNotification;
use crate::models::support::{Conversation, ConversationDetail, SupportMessage};
use crate::models::{CurrentUser, Paginated, Pagination, require_text};

const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 4000;
const PREVIEW_LENGTH: usize = 140;

pub struct SupportService<'a> {
    pool: &'a PgPool,
    support: SupportRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> SupportService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            support: SupportRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Start a conversation with its first message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank subject or message.
    #[instrument(skip(self, actor, subject, message), fields(user_id = %actor.id))]
    pub async fn open(
        &self,
        actor: &CurrentUser,
        subject: &str,
        message: &str,
    ) -> Result<ConversationDetail, AppError> {
        let subject =
            require_text("subject", subject, MAX_SUBJECT_LENGTH).map_err(AppError::BadRequest)?;
        let message = check_body(message)?;

        let mut tx = self.pool.begin().await?;
        let id = SupportRepository::insert_conversation(&mut tx, actor.id, &subject).await?;
        SupportRepository::insert_message(
            &mut tx,
            id,
            actor.id,
            &message,
            false,
            ConversationStatus::Open,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(conversation_id = %id, "Support conversation opened");
        self.get(actor, id).await
    }

    /// Customers see their own conversations, support staff see all.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(
        &self,
        actor: &CurrentUser,
        status: Option<ConversationStatus>,
        page: Pagination,
    ) -> Result<Paginated<Conversation>, AppError> {
        let staff = is_staff(actor);
        let owner = (!staff).then_some(actor.id);
        let (items, total) = self.support.list(staff, owner, status, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// A conversation with its messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if it does not exist or is not visible to
    /// `actor`.
    pub async fn get(
        &self,
        actor: &CurrentUser,
        id: ConversationId,
    ) -> Result<ConversationDetail, AppError> {
        let conversation = self.visible(actor, id).await?;
        let messages = self.support.messages(id).await?;
        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }

    /// Add a message. Staff replies notify the customer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank or oversized body or a
    /// closed conversation, `AppError::NotFound` when not visible.
    #[instrument(skip(self, actor, body), fields(conversation_id = %id, actor = %actor.id))]
    pub async fn post_message(
        &self,
        actor: &CurrentUser,
        id: ConversationId,
        body: &str,
    ) -> Result<SupportMessage, AppError> {
        let body = check_body(body)?;
        let staff = is_staff(actor);

        let mut tx = self.pool.begin().await?;
        let (owner, status, subject) = SupportRepository::lock(&mut tx, id)
            .await
            .map_err(|e| not_found_as("Conversation", e))?;
        if owner != actor.id && !staff {
            return Err(AppError::not_found("Conversation"));
        }
        if status == ConversationStatus::Closed {
            return Err(AppError::bad_request("conversation is closed"));
        }

        let message_id = SupportRepository::insert_message(
            &mut tx,
            id,
            actor.id,
            &body,
            staff,
            status_after_message(staff),
        )
        .await?;

        if staff && owner != actor.id {
            notify(
                &mut tx,
                &NewNotification {
                    user_id: owner,
                    kind: NotificationKind::SupportReply,
                    title: format!("New reply: {subject}"),
                    body: preview(&body),
                    link: Some(format!("/support/{id}")),
                },
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!(conversation_id = %id, message_id = %message_id, staff, "Support message posted");
        self.support
            .messages(id)
            .await?
            .into_iter()
            .find(|m| m.id == message_id)
            .ok_or_else(|| AppError::not_found("Message"))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the assignee cannot handle support,
    /// `AppError::NotFound` if the conversation does not exist.
    #[instrument(skip(self), fields(conversation_id = %id, staff_id = %staff_id))]
    pub async fn assign(
        &self,
        actor: &CurrentUser,
        id: ConversationId,
        staff_id: UserId,
    ) -> Result<Conversation, AppError> {
        let assignee = self
            .users
            .get_by_id(staff_id)
            .await?
            .filter(|u| u.is_active && u.role.can_handle_support())
            .ok_or_else(|| {
                AppError::bad_request(format!("user {staff_id} cannot handle support"))
            })?;
        self.support
            .assign(id, assignee.id)
            .await
            .map_err(|e| not_found_as("Conversation", e))?;
        tracing::info!(conversation_id = %id, assignee = %assignee.id, "Conversation assigned");
        self.visible(actor, id).await
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn set_status(
        &self,
        actor: &CurrentUser,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, AppError> {
        self.support
            .set_status(id, status)
            .await
            .map_err(|e| not_found_as("Conversation", e))?;
        tracing::info!(conversation_id = %id, status = ?status, "Conversation status changed");
        self.visible(actor, id).await
    }

    /// Mark the other side's messages read. Returns how many were marked.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the conversation is not visible.
    pub async fn mark_read(&self, actor: &CurrentUser, id: ConversationId) -> Result<u64, AppError> {
        self.visible(actor, id).await?;
        Ok(self.support.mark_read(id, is_staff(actor)).await?)
    }

    /// Unread messages addressed to `actor`'s side.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn unread_count(&self, actor: &CurrentUser) -> Result<i64, AppError> {
        let staff = is_staff(actor);
        let owner = (!staff).then_some(actor.id);
        Ok(self.support.unread_count(staff, owner).await?)
    }

    async fn visible(
        &self,
        actor: &CurrentUser,
        id: ConversationId,
    ) -> Result<Conversation, AppError> {
        self.support
            .get_by_id(id, is_staff(actor))
            .await?
            .filter(|c| c.user_id == actor.id || is_staff(actor))
            .ok_or_else(|| AppError::not_found("Conversation"))
    }
}

const fn is_staff(actor: &CurrentUser) -> bool {
    actor.role.can_handle_support()
}

/// Who waits next: staff replies hand the turn to the customer.
const fn status_after_message(from_staff: bool) -> ConversationStatus {
    if from_staff {
        ConversationStatus::Pending
    } else {
        ConversationStatus::Open
    }
}

fn check_body(body: &str) -> Result<String, AppError> {
    require_text("body", body, MAX_MESSAGE_LENGTH).map_err(AppError::BadRequest)
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LENGTH {
        return body.to_owned();
    }
    let cut: String = body.chars().take(PREVIEW_LENGTH).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_taking() {
        assert_eq!(status_after_message(true), ConversationStatus::Pending);
        assert_eq!(status_after_message(false), ConversationStatus::Open);
    }

    #[test]
    fn test_message_length_limits() {
        assert!(check_body("   ").is_err());
        assert!(check_body(&"a".repeat(4000)).is_ok());
        assert!(check_body(&"a".repeat(4001)).is_err());
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short"), "short");
        let long = "я".repeat(200);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_LENGTH + 1);
        assert!(cut.ends_with('…'));
    }
}
