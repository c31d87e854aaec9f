//! # Domain Services
//!
//! Contracts for collaborators that are not entity repositories.
//!
//! - **BlobStore**: upload bytes, delete by path

mod blob_store;

pub use blob_store::*;
