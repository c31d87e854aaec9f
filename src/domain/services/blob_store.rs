//! Blob storage contract.
//!
//! Chat images are written once on upload and deleted by path. Content is
//! never inspected after upload.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("blob io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a fresh path derived from `filename`; returns the path.
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    /// Delete the blob at `path`. Deleting a missing blob succeeds.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;
}
