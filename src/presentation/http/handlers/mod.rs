//! HTTP Handlers

pub mod attachment;
pub mod conversation;
pub mod health;
pub mod message;
