//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::domain::{ConversationSummary, Message, Snowflake};

/// Result of an image upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub path: String,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationResponse {
    pub conversation_id: Snowflake,
    /// Whether the target is connected right now
    pub is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    /// Counterparts that are connected right now
    pub online: Vec<Snowflake>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
}
