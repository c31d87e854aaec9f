//! # Domain Layer
//!
//! Core types of the direct-messaging service, independent of any framework
//! or storage engine.
//!
//! - **entities**: User, Conversation, Message and attachment claims
//! - **value_objects**: Snowflake ids
//! - **services**: blob storage contract
//!
//! Data access is expressed as traits here and implemented in the
//! infrastructure layer.

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
