//! # dm-gateway
//!
//! Real-time session layer of a two-party direct-messaging service:
//! - one WebSocket session per user, with presence fan-out to the users they
//!   share a conversation with
//! - message delivery with acknowledgement, validation and rate limiting
//! - short-lived attachment claims for uploaded images, reclaimed on expiry
//! - a small REST surface for uploads, conversations, history and deletion
//!
//! ## Module Structure
//!
//! ```text
//! dm_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Entities, ids and repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ PostgreSQL, Redis, blob storage, metrics
//! +-- presentation/   HTTP routes, middleware, WebSocket gateway
//! +-- shared/         Errors, ids, rate limiting, background tasks
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
