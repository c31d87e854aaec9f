//! Conversation Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::{
    ConversationListResponse, CreateConversationRequest, CreateConversationResponse,
    HistoryQuery, HistoryResponse,
};
use crate::application::services::{ConversationError, CreatedConversation, MessageError};
use crate::domain::Snowflake;
use crate::presentation::middleware::AuthUser;
use crate::presentation::websocket::OutboundFrame;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Start a conversation with another user
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreateConversationResponse>), AppError> {
    body.validate().map_err(validation_error)?;
    let target = body
        .target()
        .ok_or_else(|| AppError::BadRequest("Invalid user ID".into()))?;

    let CreatedConversation {
        conversation,
        creator,
    } = state
        .conversations
        .create(auth.user_id, target)
        .await
        .map_err(|e| match e {
            ConversationError::SelfConversation => AppError::BadRequest(e.to_string()),
            ConversationError::TargetNotFound => AppError::NotFound(e.to_string()),
            ConversationError::AlreadyExists => AppError::Conflict(e.to_string()),
            ConversationError::Internal(msg) => AppError::Internal(msg),
        })?;

    state.registry.link(auth.user_id, target);
    state.registry.dispatch(
        target,
        OutboundFrame::Cnv {
            user: creator,
            cnv_id: conversation.id,
            is_online: state.registry.is_online(auth.user_id),
        },
    );

    tracing::info!(
        conversation_id = %conversation.id,
        creator = %auth.user_id,
        target = %target,
        "Conversation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation_id: conversation.id,
            is_online: state.registry.is_online(target),
        }),
    ))
}

/// Conversations of the caller, with the online subset of counterparts
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state
        .conversations
        .list(auth.user_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let counterparts: Vec<Snowflake> = conversations.iter().map(|c| c.participant.id).collect();
    let online = state.registry.filter_online(&counterparts);

    Ok(Json(ConversationListResponse {
        conversations,
        online,
    }))
}

/// One page of a conversation's history, newest first
pub async fn get_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    query.validate().map_err(validation_error)?;
    let conversation_id: Snowflake = conversation_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid conversation ID".into()))?;

    let messages = state
        .messages
        .history(conversation_id, auth.user_id, query.page())
        .await
        .map_err(|e| match e {
            MessageError::ConversationNotFound | MessageError::Forbidden => {
                AppError::NotFound("Conversation not found.".into())
            }
            MessageError::InvalidPage => AppError::BadRequest(e.to_string()),
            e => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(HistoryResponse { messages }))
}
