//! Message Pipeline
//!
//! Handles one inbound text frame: admission, decoding, validation,
//! attachment check, persistence, delivery to the peer and the author's
//! acknowledgement, in that order. Recoverable failures are answered with
//! an `err` frame and the connection stays up.

use std::sync::Arc;

use super::protocol::{InboundFrame, OutboundFrame, ValidatedFrame};
use super::registry::ConnectionRegistry;
use super::session::Session;
use crate::application::services::{
    AttachmentService, DeliveredMessage, MessageService, NewMessage,
};
use crate::infrastructure::metrics;
use crate::shared::rate_limiter::RateLimiter;

pub const RATE_LIMITED_MESSAGE: &str = "Too fast.";
pub const SEND_FAILED_MESSAGE: &str = "Couldn't send message.";

/// How a frame was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Delivered,
    RateLimited,
    Invalid,
    AttachmentRejected,
    PersistFailed,
}

impl FrameOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameOutcome::Delivered => "delivered",
            FrameOutcome::RateLimited => "rate_limited",
            FrameOutcome::Invalid => "invalid",
            FrameOutcome::AttachmentRejected => "attachment_rejected",
            FrameOutcome::PersistFailed => "persist_failed",
        }
    }
}

/// Failures that end the connection.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct MessagePipeline {
    limiter: Arc<RateLimiter>,
    attachments: Arc<AttachmentService>,
    messages: Arc<dyn MessageService>,
    registry: Arc<ConnectionRegistry>,
}

impl MessagePipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        attachments: Arc<AttachmentService>,
        messages: Arc<dyn MessageService>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            limiter,
            attachments,
            messages,
            registry,
        }
    }

    /// Run one text frame from `session` through every stage.
    ///
    /// `rate_key` identifies the sender for admission, normally its remote
    /// address. Frames that are not JSON objects are a protocol violation.
    pub async fn handle_text(
        &self,
        session: &Arc<Session>,
        rate_key: &str,
        text: &str,
    ) -> Result<FrameOutcome, PipelineError> {
        if !self.limiter.allow(rate_key) {
            self.reply(session, OutboundFrame::error(RATE_LIMITED_MESSAGE, None))
                .await;
            return Ok(self.finish(FrameOutcome::RateLimited));
        }

        let inbound: InboundFrame = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                metrics::record_frame("malformed");
                return Err(e.into());
            }
        };

        let frame = match inbound.validate() {
            Ok(frame) => frame,
            Err(e) => {
                self.reply(
                    session,
                    OutboundFrame::error(e.to_string(), inbound.correlation_id()),
                )
                .await;
                return Ok(self.finish(FrameOutcome::Invalid));
            }
        };

        let sender = session.user_id();
        if let Some(path) = &frame.image {
            if let Err(e) = self.attachments.verify(sender, path).await {
                self.reply(
                    session,
                    OutboundFrame::error(e.to_string(), Some(frame.request_id.clone())),
                )
                .await;
                return Ok(self.finish(FrameOutcome::AttachmentRejected));
            }
        }

        let ValidatedFrame {
            request_id,
            conversation_id,
            text,
            image,
        } = frame;
        let has_image = image.is_some();

        let delivered = self
            .messages
            .send_direct(NewMessage {
                conversation_id,
                sender,
                text,
                image,
            })
            .await;
        let DeliveredMessage {
            message,
            receiver_id,
        } = match delivered {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!(
                    user_id = %sender,
                    conversation_id = %conversation_id,
                    error = %e,
                    "Message not persisted"
                );
                self.reply(
                    session,
                    OutboundFrame::error(SEND_FAILED_MESSAGE, Some(request_id)),
                )
                .await;
                return Ok(self.finish(FrameOutcome::PersistFailed));
            }
        };

        if has_image {
            self.attachments.release(sender);
        }

        self.registry.dispatch(
            receiver_id,
            OutboundFrame::Msg {
                message: message.clone(),
            },
        );
        self.reply(
            session,
            OutboundFrame::Acknowledged {
                message,
                id: request_id,
            },
        )
        .await;

        Ok(self.finish(FrameOutcome::Delivered))
    }

    /// Write to the sending session. A failed write marks it closed, which
    /// the read loop picks up.
    async fn reply(&self, session: &Session, frame: OutboundFrame) {
        if let Err(e) = session.send(&frame).await {
            tracing::debug!(
                user_id = %session.user_id(),
                frame = frame.kind(),
                error = %e,
                "Reply not delivered"
            );
        }
    }

    fn finish(&self, outcome: FrameOutcome) -> FrameOutcome {
        metrics::record_frame(outcome.as_str());
        outcome
    }
}
