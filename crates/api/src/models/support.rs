//! Support chat between customers and staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{ConversationId, ConversationStatus, SupportMessageId, UserId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub customer_name: String,
    pub subject: String,
    pub status: ConversationStatus,
    pub assigned_to: Option<UserId>,
    pub last_message_at: DateTime<Utc>,
    /// Messages from the other side the viewer has not read yet.
    pub unread: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    pub id: SupportMessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub body: String,
    pub is_staff: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<SupportMessage>,
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub staff_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ConversationStatusRequest {
    pub status: ConversationStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
}
