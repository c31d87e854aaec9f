//! Infrastructure Layer
//!
//! Implementations of the domain contracts:
//! - Database repositories (PostgreSQL)
//! - Attachment claims and expiry events (Redis)
//! - Blob storage (local filesystem)
//! - Prometheus metrics

pub mod blob;
pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
