//! WebSocket Connection Handler
//!
//! Authenticates the upgrade request, then drives one connection through
//! its whole lifecycle: register, load participants, announce online, read
//! frames until the connection ends, disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use tokio::time::timeout;

use super::liveness::spawn_liveness;
use super::pipeline::MessagePipeline;
use super::session::{CloseReason, Session};
use crate::application::dto::TokenQuery;
use crate::application::services::AuthError;
use crate::domain::Snowflake;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler
///
/// Browsers cannot set headers on an upgrade, so the credential travels in
/// the `token` query parameter.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let token = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => return AppError::Unauthorized("Invalid token query.".into()).into_response(),
    };

    let user_id = match state.authenticator.authenticate(token).await {
        Ok(user_id) => user_id,
        Err(AuthError::Internal(e)) => {
            return AppError::Internal(format!("Authentication failed: {e}")).into_response()
        }
        Err(e) => {
            tracing::debug!(addr = %addr, error = %e, "Rejected socket upgrade");
            return AppError::Unauthorized("Authentication is required.".into()).into_response();
        }
    };

    ws.max_message_size(state.settings.websocket.max_message_size)
        .on_upgrade(move |socket| run_session(socket, state, user_id, addr))
}

async fn run_session(socket: WebSocket, state: AppState, user_id: Snowflake, addr: SocketAddr) {
    let (sink, stream) = socket.split();
    let session = state.registry.connect(user_id, Box::new(sink));

    match session
        .load_participants(state.conversation_repo.as_ref())
        .await
    {
        Ok(count) => {
            tracing::debug!(user_id = %user_id, participants = count, "Participants loaded");
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to load participants");
            state
                .registry
                .disconnect(&session, CloseReason::TransportError)
                .await;
            return;
        }
    }

    state
        .registry
        .notify_status(&session.participants_snapshot(), user_id, true);
    let liveness = spawn_liveness(session.clone(), state.settings.websocket.ping_interval());

    let reason = read_loop(
        &session,
        stream,
        &state.pipeline,
        &addr.ip().to_string(),
        state.settings.websocket.pong_wait(),
    )
    .await;

    state.registry.disconnect(&session, reason).await;
    liveness.abort();
}

/// Read frames in arrival order until the connection ends.
///
/// Each received frame, pongs included, resets the read deadline. Returns
/// why the loop stopped.
pub async fn read_loop<S, E>(
    session: &Arc<Session>,
    mut stream: S,
    pipeline: &MessagePipeline,
    rate_key: &str,
    read_deadline: Duration,
) -> CloseReason
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        let next = tokio::select! {
            reason = session.closed() => return reason,
            next = timeout(read_deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::debug!(user_id = %session.user_id(), "Read deadline exceeded");
                return CloseReason::Timeout;
            }
            Ok(None) => return CloseReason::ClientClosed,
            Ok(Some(Err(e))) => {
                tracing::debug!(user_id = %session.user_id(), error = %e, "WebSocket error");
                return CloseReason::TransportError;
            }
            Ok(Some(Ok(message))) => message,
        };
        session.touch();

        match message {
            WsMessage::Text(text) => {
                if let Err(e) = pipeline.handle_text(session, rate_key, text.as_str()).await {
                    tracing::debug!(user_id = %session.user_id(), error = %e, "Closing on bad frame");
                    return CloseReason::ProtocolViolation;
                }
            }
            WsMessage::Close(_) => return CloseReason::ClientClosed,
            // Pings are answered by the transport; pongs only refresh the deadline
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Binary(_) => {
                tracing::debug!(user_id = %session.user_id(), "Closing on binary frame");
                return CloseReason::ProtocolViolation;
            }
        }
    }
}
