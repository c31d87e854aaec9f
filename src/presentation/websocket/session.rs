//! WebSocket Session
//!
//! One live connection of an authenticated user. Writes are serialized
//! through a single lock and bounded by a deadline, so a slow peer can stall
//! only its own session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use super::protocol::OutboundFrame;
use crate::domain::{ConversationRepository, Snowflake};
use crate::shared::error::AppError;

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError>;

    async fn send_ping(&mut self) -> Result<(), SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, WsMessage> {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        SinkExt::send(self, WsMessage::Text(text.into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        SinkExt::send(self, WsMessage::Ping(Bytes::new()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        SinkExt::close(self)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Write deadline exceeded")]
    Timeout,

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Why a session ended. The first reason recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    Timeout,
    HeartbeatFailed,
    /// Replaced by a newer connection of the same user
    Evicted,
    ProtocolViolation,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::Timeout => "timeout",
            CloseReason::HeartbeatFailed => "heartbeat_failed",
            CloseReason::Evicted => "evicted",
            CloseReason::ProtocolViolation => "protocol_violation",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

pub struct Session {
    user_id: Snowflake,
    connection_id: Uuid,
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
    write_timeout: Duration,
    /// Counterparts of every conversation the user is in
    participants: RwLock<Vec<Snowflake>>,
    closed: watch::Sender<Option<CloseReason>>,
    sink_closed: AtomicBool,
    last_seen: Mutex<Instant>,
}

impl Session {
    pub fn new(user_id: Snowflake, sink: Box<dyn FrameSink>, write_timeout: Duration) -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            user_id,
            connection_id: Uuid::new_v4(),
            sink: tokio::sync::Mutex::new(sink),
            write_timeout,
            participants: RwLock::new(Vec::new()),
            closed,
            sink_closed: AtomicBool::new(false),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Write one frame within the write deadline.
    ///
    /// A failed or timed out write leaves the transport in an unknown state,
    /// so the session is marked closed and the read loop tears it down.
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let text = serde_json::to_string(frame)?;

        let mut sink = self.sink.lock().await;
        match timeout(self.write_timeout, sink.send_text(text)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.mark_closed(CloseReason::TransportError);
                Err(e)
            }
            Err(_) => {
                self.mark_closed(CloseReason::Timeout);
                Err(SessionError::Timeout)
            }
        }
    }

    /// Send a transport-level ping within the write deadline.
    pub async fn heartbeat(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut sink = self.sink.lock().await;
        let result = match timeout(self.write_timeout, sink.send_ping()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout),
        };
        if result.is_err() {
            self.mark_closed(CloseReason::HeartbeatFailed);
        }
        result
    }

    /// Record why the session ends. Returns false if it was already closed.
    pub fn mark_closed(&self, reason: CloseReason) -> bool {
        self.closed.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    /// Mark the session closed and shut the transport. Safe to call twice.
    pub async fn close(&self, reason: CloseReason) {
        self.mark_closed(reason);
        if self.sink_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.sink.lock().await;
        match timeout(self.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(
                user_id = %self.user_id,
                connection_id = %self.connection_id,
                error = %e,
                "Close frame not delivered"
            ),
            Err(_) => tracing::debug!(
                user_id = %self.user_id,
                connection_id = %self.connection_id,
                "Close frame timed out"
            ),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closed.borrow()
    }

    /// Resolves once the session is marked closed.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.closed.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(CloseReason::Shutdown),
            Err(_) => CloseReason::Shutdown,
        };
        reason
    }

    /// Load the counterpart set from storage, replacing what was there.
    pub async fn load_participants(
        &self,
        conversations: &dyn ConversationRepository,
    ) -> Result<usize, AppError> {
        let mut ids = conversations.counterpart_ids(self.user_id).await?;
        ids.sort_unstable();
        ids.dedup();
        let count = ids.len();
        *self.participants.write() = ids;
        Ok(count)
    }

    /// Add a counterpart. Returns false if it was already known.
    pub fn append_participant(&self, id: Snowflake) -> bool {
        let mut participants = self.participants.write();
        if participants.contains(&id) {
            return false;
        }
        participants.push(id);
        true
    }

    pub fn participants_snapshot(&self) -> Vec<Snowflake> {
        self.participants.read().clone()
    }

    /// Note inbound traffic.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the peer last sent anything, pongs included.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}
