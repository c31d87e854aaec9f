//! Wire protocol
//!
//! Text frames carrying JSON objects. Clients send one frame type, `msg`;
//! the server sends acknowledgements, deliveries, errors and notices, all
//! tagged by `type`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Message, Snowflake, UserPreview};

/// The only inbound frame type.
pub const MESSAGE_FRAME: &str = "msg";

/// Inbound frame as decoded. Missing fields decode as empty and are caught by
/// [`InboundFrame::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundFrame {
    /// Client-generated correlation token (UUID)
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub conversation_id: String,
    pub message: String,
    /// Path returned by a prior upload
    pub image: Option<String>,
}

/// A frame that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFrame {
    pub request_id: String,
    pub conversation_id: Snowflake,
    /// Trimmed text
    pub text: String,
    pub image: Option<String>,
}

/// Validation failures. Messages are sent to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid request ID. Must be a valid UUID.")]
    InvalidRequestId,

    #[error("Invalid type.")]
    InvalidType,

    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Invalid conversation ID.")]
    InvalidConversationId,
}

impl InboundFrame {
    /// Check the frame in order: id, type, text, conversation.
    pub fn validate(&self) -> Result<ValidatedFrame, ProtocolError> {
        Uuid::parse_str(&self.id).map_err(|_| ProtocolError::InvalidRequestId)?;
        if self.kind != MESSAGE_FRAME {
            return Err(ProtocolError::InvalidType);
        }
        let text = self.message.trim();
        if text.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        let conversation_id = self
            .conversation_id
            .parse()
            .map_err(|_| ProtocolError::InvalidConversationId)?;

        Ok(ValidatedFrame {
            request_id: self.id.clone(),
            conversation_id,
            text: text.to_owned(),
            image: self.image.clone().filter(|path| !path.is_empty()),
        })
    }

    /// Request id to echo on errors, when the client sent one.
    pub fn correlation_id(&self) -> Option<String> {
        Some(self.id.clone()).filter(|id| !id.is_empty())
    }
}

/// Every frame the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Sent back to the author once the message is persisted
    Acknowledged { message: Message, id: String },

    /// Delivered to the other participant
    Msg { message: Message },

    Err {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Presence change of a participant
    Status {
        #[serde(rename = "userId")]
        user_id: Snowflake,
        online: bool,
    },

    /// A conversation was started with the recipient
    Cnv {
        user: UserPreview,
        #[serde(rename = "cnvId")]
        cnv_id: Snowflake,
        #[serde(rename = "isOnline")]
        is_online: bool,
    },

    /// A message in a shared conversation was deleted
    Delete {
        #[serde(rename = "messageId")]
        message_id: Snowflake,
        #[serde(rename = "conversationId")]
        conversation_id: Snowflake,
    },
}

impl OutboundFrame {
    pub fn error(message: impl Into<String>, id: Option<String>) -> Self {
        OutboundFrame::Err {
            message: message.into(),
            id,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundFrame::Acknowledged { .. } => "acknowledged",
            OutboundFrame::Msg { .. } => "msg",
            OutboundFrame::Err { .. } => "err",
            OutboundFrame::Status { .. } => "status",
            OutboundFrame::Cnv { .. } => "cnv",
            OutboundFrame::Delete { .. } => "delete",
        }
    }
}
