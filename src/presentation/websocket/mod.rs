//! WebSocket Gateway
//!
//! Real-time delivery of direct messages and presence over one persistent
//! connection per user.

pub mod handler;
pub mod liveness;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod session;

pub use handler::ws_handler;
pub use pipeline::{FrameOutcome, MessagePipeline};
pub use protocol::{InboundFrame, OutboundFrame, ProtocolError};
pub use registry::ConnectionRegistry;
pub use session::{CloseReason, FrameSink, Session, SessionError};
