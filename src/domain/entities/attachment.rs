//! Attachment claims.
//!
//! An uploaded image that has not been sent yet is tracked by a claim: a short
//! "active" key that controls its lifetime and a longer-lived "data" key that
//! holds the blob path. Each owner has at most one claim.

use async_trait::async_trait;

use crate::domain::Snowflake;

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("no pending attachment")]
    NotFound,

    #[error("claim store unavailable: {0}")]
    Store(String),
}

/// Backing store for attachment claims.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentClaims: Send + Sync {
    /// Register `path` as the owner's pending attachment.
    ///
    /// Replaces any previous claim atomically and returns its path.
    async fn issue(&self, owner: Snowflake, path: &str) -> Result<Option<String>, ClaimError>;

    /// Path of the owner's current claim.
    async fn get(&self, owner: Snowflake) -> Result<String, ClaimError>;

    /// Drop both keys. Succeeds when nothing is there.
    async fn consume(&self, owner: Snowflake) -> Result<(), ClaimError>;

    /// Path left behind after the active key expired, if any.
    ///
    /// Returns `None` while the claim is still active, so a claim reissued
    /// between the expiry and the lookup is never reaped.
    async fn orphaned(&self, owner: Snowflake) -> Result<Option<String>, ClaimError>;

    /// Delete the data key only if it still holds `path`.
    async fn discard(&self, owner: Snowflake, path: &str) -> Result<(), ClaimError>;
}
