//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! - **Authenticator**: bearer token to identity
//! - **AttachmentService**: uploads, claims and their cleanup
//! - **ConversationService**: conversation creation and listing
//! - **MessageService**: persistence, history and deletion of messages

pub mod attachment_service;
pub mod auth_service;
pub mod conversation_service;
pub mod message_service;

pub use attachment_service::{AttachmentError, AttachmentService};
pub use auth_service::{AuthError, Authenticator, Claims, JwtAuthenticator};
pub use conversation_service::{
    ConversationError, ConversationService, ConversationServiceImpl, CreatedConversation,
};
pub use message_service::{
    DeletedMessage, DeliveredMessage, MessageError, MessageService, MessageServiceImpl, NewMessage,
};

#[cfg(test)]
pub use auth_service::MockAuthenticator;
#[cfg(test)]
pub use conversation_service::MockConversationService;
#[cfg(test)]
pub use message_service::MockMessageService;
