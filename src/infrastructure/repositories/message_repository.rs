//! Message Repository Implementation
//!
//! History pages are offset-based and ordered newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageRepository, Snowflake};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct MessageRow {
    pub(super) id: i64,
    pub(super) conversation_id: i64,
    pub(super) sender_id: i64,
    pub(super) text: String,
    pub(super) image: Option<String>,
    pub(super) created_at: DateTime<Utc>,
}

impl MessageRow {
    pub(super) fn into_message(self) -> Message {
        Message {
            id: Snowflake(self.id),
            conversation_id: Snowflake(self.conversation_id),
            sender: Snowflake(self.sender_id),
            text: self.text,
            image: self.image,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, text, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id.as_i64())
        .bind(message.conversation_id.as_i64())
        .bind(message.sender.as_i64())
        .bind(&message.text)
        .bind(&message.image)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Snowflake) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, text, image, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn find_page(
        &self,
        conversation_id: Snowflake,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Message>, AppError> {
        let offset = (page.max(1) - 1) * per_page;
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, text, image, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id.as_i64())
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn delete(&self, id: Snowflake) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
