//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! - **PgUserRepository** - identity lookups and previews
//! - **PgConversationRepository** - two-party conversations and listings
//! - **PgMessageRepository** - message CRUD with page-based history

pub mod conversation_repository;
pub mod message_repository;
pub mod user_repository;

pub use conversation_repository::PgConversationRepository;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;
