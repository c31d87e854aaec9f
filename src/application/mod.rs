//! Application Layer
//!
//! Services coordinating domain operations, and the DTOs of the HTTP surface.

pub mod dto;
pub mod services;
