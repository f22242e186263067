//! Support chat repository.
//!
//! Unread counts are always relative to a side: a customer sees unread staff
//! replies, staff see unread customer messages.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use emporium_core::{ConversationId, ConversationStatus, SupportMessageId, UserId};

use super::{RepositoryError, expect_affected};
use crate::models::Pagination;
use crate::models::support::{Conversation, SupportMessage};

/// `$1` is whether the viewer is staff.
const CONVERSATION_SELECT: &str = r"
    SELECT c.id, c.user_id, u.name AS customer_name, c.subject, c.status, c.assigned_to,
           c.last_message_at, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM support_messages m
             WHERE m.conversation_id = c.id AND m.read_at IS NULL AND m.is_staff <> $1) AS unread
    FROM support_conversations c
    JOIN users u ON u.id = c.user_id";

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: ConversationId,
    user_id: UserId,
    customer_name: String,
    subject: String,
    status: ConversationStatus,
    assigned_to: Option<UserId>,
    last_message_at: DateTime<Utc>,
    unread: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            customer_name: row.customer_name,
            subject: row.subject,
            status: row.status,
            assigned_to: row.assigned_to,
            last_message_at: row.last_message_at,
            unread: row.unread,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: SupportMessageId,
    conversation_id: ConversationId,
    sender_id: UserId,
    sender_name: String,
    body: String,
    is_staff: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for SupportMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            body: row.body,
            is_staff: row.is_staff,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for support chat database operations.
pub struct SupportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Conversations, most recently active first.
    ///
    /// `owner` restricts the list to one customer's conversations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        viewer_is_staff: bool,
        owner: Option<UserId>,
        status: Option<ConversationStatus>,
        page: Pagination,
    ) -> Result<(Vec<Conversation>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM support_conversations c
            WHERE ($1::int IS NULL OR c.user_id = $1)
              AND ($2::conversation_status IS NULL OR c.status = $2)
            ",
        )
        .bind(owner)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
            r"
            {CONVERSATION_SELECT}
            WHERE ($2::int IS NULL OR c.user_id = $2)
              AND ($3::conversation_status IS NULL OR c.status = $3)
            ORDER BY c.last_message_at DESC, c.id DESC LIMIT $4 OFFSET $5
            "
        ))
        .bind(viewer_is_staff)
        .bind(owner)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: ConversationId,
        viewer_is_staff: bool,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row: Option<ConversationRow> =
            sqlx::query_as(&format!("{CONVERSATION_SELECT} WHERE c.id = $2"))
                .bind(viewer_is_staff)
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    /// Messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(
        &self,
        id: ConversationId,
    ) -> Result<Vec<SupportMessage>, RepositoryError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r"
            SELECT m.id, m.conversation_id, m.sender_id, u.name AS sender_name, m.body,
                   m.is_staff, m.read_at, m.created_at
            FROM support_messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at, m.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Unread messages from the other side across all visible conversations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(
        &self,
        viewer_is_staff: bool,
        owner: Option<UserId>,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM support_messages m
            JOIN support_conversations c ON c.id = m.conversation_id
            WHERE m.read_at IS NULL AND m.is_staff <> $1
              AND ($2::int IS NULL OR c.user_id = $2)
            ",
        )
        .bind(viewer_is_staff)
        .bind(owner)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Mark the other side's messages in a conversation read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_read(
        &self,
        id: ConversationId,
        viewer_is_staff: bool,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE support_messages SET read_at = NOW()
            WHERE conversation_id = $1 AND is_staff <> $2 AND read_at IS NULL
            ",
        )
        .bind(id)
        .bind(viewer_is_staff)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist.
    pub async fn assign(
        &self,
        id: ConversationId,
        staff: UserId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE support_conversations SET assigned_to = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(staff)
        .execute(self.pool)
        .await?;
        expect_affected(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist.
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE support_conversations SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;
        expect_affected(result.rows_affected())
    }

    // =========================================================================
    // Transactional steps
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_conversation(
        conn: &mut PgConnection,
        user: UserId,
        subject: &str,
    ) -> Result<ConversationId, RepositoryError> {
        let id: ConversationId = sqlx::query_scalar(
            "INSERT INTO support_conversations (user_id, subject) VALUES ($1, $2) RETURNING id",
        )
        .bind(user)
        .bind(subject)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Lock a conversation and return its owner and status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist.
    pub async fn lock(
        conn: &mut PgConnection,
        id: ConversationId,
    ) -> Result<(UserId, ConversationStatus, String), RepositoryError> {
        let row: Option<(UserId, ConversationStatus, String)> = sqlx::query_as(
            "SELECT user_id, status, subject FROM support_conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        row.ok_or(RepositoryError::NotFound)
    }

    /// Insert a message and bump the conversation's activity and status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn insert_message(
        conn: &mut PgConnection,
        id: ConversationId,
        sender: UserId,
        body: &str,
        is_staff: bool,
        next_status: ConversationStatus,
    ) -> Result<SupportMessageId, RepositoryError> {
        let message: SupportMessageId = sqlx::query_scalar(
            r"
            INSERT INTO support_messages (conversation_id, sender_id, body, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(id)
        .bind(sender)
        .bind(body)
        .bind(is_staff)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            r"
            UPDATE support_conversations
            SET status = $2, last_message_at = NOW(), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(next_status)
        .execute(conn)
        .await?;

        Ok(message)
    }
}
