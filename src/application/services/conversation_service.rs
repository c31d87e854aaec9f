//! Conversation Service
//!
//! Creates two-party conversations and lists them for a participant.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Conversation, ConversationRepository, ConversationSummary, Snowflake, UserPreview,
    UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Start a conversation between `creator` and `target`.
    async fn create(
        &self,
        creator: Snowflake,
        target: Snowflake,
    ) -> Result<CreatedConversation, ConversationError>;

    /// Conversations of `user`, most recently active first.
    async fn list(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, ConversationError>;
}

/// A freshly created conversation plus the creator's preview for the target.
#[derive(Debug, Clone)]
pub struct CreatedConversation {
    pub conversation: Conversation,
    pub creator: UserPreview,
}

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,

    #[error("User not found")]
    TargetNotFound,

    #[error("Conversation already exists")]
    AlreadyExists,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for ConversationError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Conflict(_) => ConversationError::AlreadyExists,
            other => ConversationError::Internal(other.to_string()),
        }
    }
}

pub struct ConversationServiceImpl<C, U>
where
    C: ConversationRepository,
    U: UserRepository,
{
    conversation_repo: Arc<C>,
    user_repo: Arc<U>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<C, U> ConversationServiceImpl<C, U>
where
    C: ConversationRepository,
    U: UserRepository,
{
    pub fn new(
        conversation_repo: Arc<C>,
        user_repo: Arc<U>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            conversation_repo,
            user_repo,
            id_generator,
        }
    }
}

#[async_trait]
impl<C, U> ConversationService for ConversationServiceImpl<C, U>
where
    C: ConversationRepository + 'static,
    U: UserRepository + 'static,
{
    async fn create(
        &self,
        creator: Snowflake,
        target: Snowflake,
    ) -> Result<CreatedConversation, ConversationError> {
        if creator == target {
            return Err(ConversationError::SelfConversation);
        }
        if !self.user_repo.exists(target).await? {
            return Err(ConversationError::TargetNotFound);
        }
        if self
            .conversation_repo
            .find_by_participants(creator, target)
            .await?
            .is_some()
        {
            return Err(ConversationError::AlreadyExists);
        }

        let creator_preview = self
            .user_repo
            .find_by_id(creator)
            .await?
            .map(|u| u.preview())
            .ok_or_else(|| ConversationError::Internal(format!("creator {creator} vanished")))?;

        let conversation = Conversation::new(self.id_generator.generate(), creator, target);
        // Unique (user_low, user_high) catches a concurrent create of the same pair
        self.conversation_repo.create(&conversation).await?;

        Ok(CreatedConversation {
            conversation,
            creator: creator_preview,
        })
    }

    async fn list(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, ConversationError> {
        Ok(self.conversation_repo.list_for_user(user).await?)
    }
}
