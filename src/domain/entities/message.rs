//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Snowflake;
use crate::shared::error::AppError;

/// Messages per history page.
pub const MESSAGES_PER_PAGE: i64 = 30;

/// A persisted direct message.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - conversation_id: BIGINT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE
/// - sender_id: BIGINT NOT NULL REFERENCES users(id)
/// - text: TEXT NOT NULL
/// - image: TEXT NULL (blob path)
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender: Snowflake,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a new message.
    async fn create(&self, message: &Message) -> Result<(), AppError>;

    /// Find a message by its id.
    async fn find_by_id(&self, id: Snowflake) -> Result<Option<Message>, AppError>;

    /// One page of a conversation's messages, newest first. Pages start at 1.
    async fn find_page(
        &self,
        conversation_id: Snowflake,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Delete a message. Returns false if it did not exist.
    async fn delete(&self, id: Snowflake) -> Result<bool, AppError>;
}
