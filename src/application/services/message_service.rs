//! Message Service
//!
//! Persists direct messages, serves history and handles deletion. Pointer
//! bookkeeping on the conversation row runs in the background and never
//! fails the caller. Those writes may land in any order, so the store only
//! ever moves the pointer forward, and a deletion only moves it while it
//! still names the deleted message.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    ConversationRepository, Message, MessageRepository, Snowflake, MESSAGES_PER_PAGE,
};
use crate::shared::background::BackgroundTasks;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Message service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Persist a message from a participant of the conversation.
    async fn send_direct(&self, new: NewMessage) -> Result<DeliveredMessage, MessageError>;

    /// One page of history, newest first. Pages start at 1.
    async fn history(
        &self,
        conversation_id: Snowflake,
        requester: Snowflake,
        page: i64,
    ) -> Result<Vec<Message>, MessageError>;

    /// Delete a message sent by `actor`.
    async fn delete_message(
        &self,
        message_id: Snowflake,
        actor: Snowflake,
    ) -> Result<DeletedMessage, MessageError>;
}

/// A validated message about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: Snowflake,
    pub sender: Snowflake,
    pub text: String,
    pub image: Option<String>,
}

/// A persisted message and who should receive it.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub message: Message,
    pub receiver_id: Snowflake,
}

/// What is left to clean up after a deletion.
#[derive(Debug, Clone)]
pub struct DeletedMessage {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub receiver_id: Snowflake,
    pub image: Option<String>,
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message not found")]
    NotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Invalid page")]
    InvalidPage,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for MessageError {
    fn from(e: AppError) -> Self {
        MessageError::Internal(e.to_string())
    }
}

/// MessageService implementation
pub struct MessageServiceImpl<M, C>
where
    M: MessageRepository,
    C: ConversationRepository,
{
    message_repo: Arc<M>,
    conversation_repo: Arc<C>,
    id_generator: Arc<SnowflakeGenerator>,
    background: BackgroundTasks,
}

impl<M, C> MessageServiceImpl<M, C>
where
    M: MessageRepository + 'static,
    C: ConversationRepository + 'static,
{
    pub fn new(
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        id_generator: Arc<SnowflakeGenerator>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            message_repo,
            conversation_repo,
            id_generator,
            background,
        }
    }

    fn retract_last_message(&self, conversation_id: Snowflake, deleted: Snowflake) {
        let conversations = self.conversation_repo.clone();
        self.background.spawn("retract_last_message", async move {
            let moved = conversations
                .retract_last_message(conversation_id, deleted)
                .await?;
            if moved {
                tracing::debug!(%conversation_id, %deleted, "Last message pointer retracted");
            }
            Ok::<_, AppError>(())
        });
    }
}

#[async_trait]
impl<M, C> MessageService for MessageServiceImpl<M, C>
where
    M: MessageRepository + 'static,
    C: ConversationRepository + 'static,
{
    async fn send_direct(&self, new: NewMessage) -> Result<DeliveredMessage, MessageError> {
        let conversation = self
            .conversation_repo
            .find_for_participant(new.conversation_id, new.sender)
            .await?
            .ok_or(MessageError::ConversationNotFound)?;

        let message = Message {
            id: self.id_generator.generate(),
            conversation_id: conversation.id,
            sender: new.sender,
            text: new.text,
            image: new.image,
            created_at: Utc::now(),
        };
        self.message_repo.create(&message).await?;

        let conversations = self.conversation_repo.clone();
        let (conversation_id, message_id) = (conversation.id, message.id);
        self.background.spawn("advance_last_message", async move {
            conversations
                .advance_last_message(conversation_id, message_id)
                .await
                .map(|_| ())
        });

        Ok(DeliveredMessage {
            receiver_id: conversation.other_participant(new.sender),
            message,
        })
    }

    async fn history(
        &self,
        conversation_id: Snowflake,
        requester: Snowflake,
        page: i64,
    ) -> Result<Vec<Message>, MessageError> {
        if page < 1 {
            return Err(MessageError::InvalidPage);
        }
        self.conversation_repo
            .find_for_participant(conversation_id, requester)
            .await?
            .ok_or(MessageError::ConversationNotFound)?;

        Ok(self
            .message_repo
            .find_page(conversation_id, page, MESSAGES_PER_PAGE)
            .await?)
    }

    async fn delete_message(
        &self,
        message_id: Snowflake,
        actor: Snowflake,
    ) -> Result<DeletedMessage, MessageError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;
        if message.sender != actor {
            return Err(MessageError::Forbidden);
        }

        let conversation = self
            .conversation_repo
            .find_for_participant(message.conversation_id, actor)
            .await?
            .ok_or(MessageError::ConversationNotFound)?;

        if !self.message_repo.delete(message_id).await? {
            return Err(MessageError::NotFound);
        }
        self.retract_last_message(conversation.id, message_id);

        Ok(DeletedMessage {
            message_id,
            conversation_id: conversation.id,
            receiver_id: conversation.other_participant(actor),
            image: message.image,
        })
    }
}
