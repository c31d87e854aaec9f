//! # Domain Entities
//!
//! - **User**: registered account, resolved from the identity in a token
//! - **Conversation**: two-party thread, the source of each Participant Set
//! - **Message**: persisted direct message, optionally with an image
//! - **Attachment claims**: pending image uploads scoped to their owner
//!
//! Each entity has an associated trait defining data access operations,
//! implemented in the infrastructure layer.

mod attachment;
mod conversation;
mod message;
mod user;

pub use attachment::{AttachmentClaims, ClaimError};
pub use conversation::{ordered_pair, Conversation, ConversationRepository, ConversationSummary};
pub use message::{Message, MessageRepository, MESSAGES_PER_PAGE};
pub use user::{User, UserPreview, UserRepository};

#[cfg(test)]
pub use attachment::MockAttachmentClaims;
#[cfg(test)]
pub use conversation::MockConversationRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use user::MockUserRepository;
