//! Message Handlers

use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::application::dto::MessageResponse;
use crate::application::services::{DeletedMessage, MessageError};
use crate::domain::Snowflake;
use crate::presentation::middleware::AuthUser;
use crate::presentation::websocket::OutboundFrame;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Delete one of the caller's messages and tell the other participant
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message_id: Snowflake = message_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid message id.".into()))?;

    let DeletedMessage {
        message_id,
        conversation_id,
        receiver_id,
        image,
    } = state
        .messages
        .delete_message(message_id, auth.user_id)
        .await
        .map_err(|e| match e {
            MessageError::NotFound | MessageError::Forbidden => {
                AppError::NotFound("Message not found.".into())
            }
            MessageError::ConversationNotFound => {
                AppError::NotFound("Conversation not found.".into())
            }
            e => AppError::Internal(e.to_string()),
        })?;

    if let Some(path) = image {
        state.attachments.schedule_blob_delete(path);
    }

    state.registry.dispatch(
        receiver_id,
        OutboundFrame::Delete {
            message_id,
            conversation_id,
        },
    );

    Ok(Json(MessageResponse {
        message: "Message has been deleted.",
    }))
}
