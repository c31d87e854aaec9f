//! Conversation Repository Implementation
//!
//! Pairs are stored as `(user_low, user_high)` so the unique constraint
//! covers both orderings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::message_repository::MessageRow;
use crate::domain::{
    ordered_pair, Conversation, ConversationRepository, ConversationSummary, Snowflake, UserPreview,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    user_low: i64,
    user_high: i64,
    last_message_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self) -> Conversation {
        Conversation {
            id: Snowflake(self.id),
            participants: [Snowflake(self.user_low), Snowflake(self.user_high)],
            last_message_id: self.last_message_id.map(Snowflake),
            created_at: self.created_at,
        }
    }
}

/// One listing row: the conversation, the counterpart and the last message.
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    peer_id: i64,
    peer_name: String,
    peer_avatar: Option<String>,
    message_id: Option<i64>,
    message_sender_id: Option<i64>,
    message_text: Option<String>,
    message_image: Option<String>,
    message_created_at: Option<DateTime<Utc>>,
}

impl SummaryRow {
    fn into_summary(self) -> ConversationSummary {
        let last_message = match (
            self.message_id,
            self.message_sender_id,
            self.message_text,
            self.message_created_at,
        ) {
            (Some(id), Some(sender_id), Some(text), Some(created_at)) => Some(
                MessageRow {
                    id,
                    conversation_id: self.id,
                    sender_id,
                    text,
                    image: self.message_image,
                    created_at,
                }
                .into_message(),
            ),
            _ => None,
        };

        ConversationSummary {
            id: Snowflake(self.id),
            participant: UserPreview {
                id: Snowflake(self.peer_id),
                name: self.peer_name,
                avatar: self.peer_avatar,
            },
            last_message,
        }
    }
}

/// PostgreSQL conversation repository implementation.
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_for_participant(
        &self,
        id: Snowflake,
        participant: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user_low, user_high, last_message_id, created_at
            FROM conversations
            WHERE id = $1 AND (user_low = $2 OR user_high = $2)
            "#,
        )
        .bind(id.as_i64())
        .bind(participant.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConversationRow::into_conversation))
    }

    async fn find_by_participants(
        &self,
        a: Snowflake,
        b: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        let [low, high] = ordered_pair(a, b);
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user_low, user_high, last_message_id, created_at
            FROM conversations
            WHERE user_low = $1 AND user_high = $2
            "#,
        )
        .bind(low.as_i64())
        .bind(high.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConversationRow::into_conversation))
    }

    async fn counterpart_ids(&self, user: Snowflake) -> Result<Vec<Snowflake>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT CASE WHEN user_low = $1 THEN user_high ELSE user_low END
            FROM conversations
            WHERE user_low = $1 OR user_high = $1
            "#,
        )
        .bind(user.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(Snowflake).collect())
    }

    async fn list_for_user(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT c.id,
                   u.id         AS peer_id,
                   u.name       AS peer_name,
                   u.avatar     AS peer_avatar,
                   m.id         AS message_id,
                   m.sender_id  AS message_sender_id,
                   m.text       AS message_text,
                   m.image      AS message_image,
                   m.created_at AS message_created_at
            FROM conversations c
            JOIN users u
              ON u.id = CASE WHEN c.user_low = $1 THEN c.user_high ELSE c.user_low END
            LEFT JOIN messages m ON m.id = c.last_message_id
            WHERE c.user_low = $1 OR c.user_high = $1
            ORDER BY COALESCE(m.created_at, c.created_at) DESC
            "#,
        )
        .bind(user.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SummaryRow::into_summary).collect())
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AppError> {
        let [low, high] = conversation.participants;
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_low, user_high, last_message_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation.id.as_i64())
        .bind(low.as_i64())
        .bind(high.as_i64())
        .bind(conversation.last_message_id.map(|id| id.as_i64()))
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Conversation already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(())
    }

    async fn advance_last_message(
        &self,
        id: Snowflake,
        message_id: Snowflake,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = $2
            WHERE id = $1 AND (last_message_id IS NULL OR last_message_id < $2)
            "#,
        )
        .bind(id.as_i64())
        .bind(message_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retract_last_message(
        &self,
        id: Snowflake,
        deleted: Snowflake,
    ) -> Result<bool, AppError> {
        // One statement, so the row lock orders it against a concurrent advance
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = (SELECT MAX(m.id) FROM messages m WHERE m.conversation_id = $1)
            WHERE id = $1 AND last_message_id = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(deleted.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
