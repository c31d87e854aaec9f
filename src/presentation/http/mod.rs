//! HTTP API
//!
//! REST endpoints around the socket gateway: uploads, conversations,
//! history, deletion, health and metrics.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
