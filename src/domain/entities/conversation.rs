//! Conversation entity and repository trait.
//!
//! A conversation is always between exactly two users. Participants are kept
//! in ascending order so a pair maps to a single row regardless of who
//! created it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::user::UserPreview;
use crate::domain::Snowflake;
use crate::shared::error::AppError;

/// Maps to the `conversations` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - user_low: BIGINT NOT NULL REFERENCES users(id)
/// - user_high: BIGINT NOT NULL REFERENCES users(id), CHECK (user_low < user_high)
/// - last_message_id: BIGINT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Snowflake,
    pub participants: [Snowflake; 2],
    pub last_message_id: Option<Snowflake>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a new conversation between `a` and `b`.
    pub fn new(id: Snowflake, a: Snowflake, b: Snowflake) -> Self {
        Self {
            id,
            participants: ordered_pair(a, b),
            last_message_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether `user` is one of the two participants.
    pub fn includes(&self, user: Snowflake) -> bool {
        self.participants.contains(&user)
    }

    /// The participant that is not `user`.
    ///
    /// Only meaningful when `includes(user)` holds.
    pub fn other_participant(&self, user: Snowflake) -> Snowflake {
        if self.participants[0] == user {
            self.participants[1]
        } else {
            self.participants[0]
        }
    }
}

/// Canonical ordering for a participant pair.
pub fn ordered_pair(a: Snowflake, b: Snowflake) -> [Snowflake; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

/// A conversation as listed for one of its participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Snowflake,
    pub participant: UserPreview,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}

/// Repository trait for Conversation data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by id, only if `participant` belongs to it.
    async fn find_for_participant(
        &self,
        id: Snowflake,
        participant: Snowflake,
    ) -> Result<Option<Conversation>, AppError>;

    /// Find the conversation between two users, if any.
    async fn find_by_participants(
        &self,
        a: Snowflake,
        b: Snowflake,
    ) -> Result<Option<Conversation>, AppError>;

    /// Every user that shares a conversation with `user`.
    async fn counterpart_ids(&self, user: Snowflake) -> Result<Vec<Snowflake>, AppError>;

    /// Conversations of `user`, most recently active first.
    async fn list_for_user(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, AppError>;

    /// Insert a new conversation. A duplicate pair yields `AppError::Conflict`.
    async fn create(&self, conversation: &Conversation) -> Result<(), AppError>;

    /// Move the pointer to `message_id` unless it already points at a newer
    /// message. Snowflakes grow over time, so concurrent sends settle on the
    /// newest one whatever order they finish in. Returns whether it moved.
    async fn advance_last_message(
        &self,
        id: Snowflake,
        message_id: Snowflake,
    ) -> Result<bool, AppError>;

    /// After `deleted` is gone, repoint at the newest remaining message, but
    /// only while the pointer still names `deleted`. Returns whether it moved.
    async fn retract_last_message(
        &self,
        id: Snowflake,
        deleted: Snowflake,
    ) -> Result<bool, AppError>;
}
