//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod background;
pub mod error;
pub mod rate_limiter;
pub mod snowflake;
pub mod validation;
