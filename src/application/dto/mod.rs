//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{CreateConversationRequest, HistoryQuery, TokenQuery};
pub use response::{
    ConversationListResponse, CreateConversationResponse, HistoryResponse, MessageResponse,
    UploadResponse,
};
