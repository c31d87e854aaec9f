//! Attachment Service
//!
//! Ties uploaded blobs to their owner's pending claim. A blob is either
//! referenced by a persisted message, referenced by the owner's single
//! outstanding claim, or scheduled for deletion.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{AttachmentClaims, BlobError, BlobStore, ClaimError, Snowflake};
use crate::shared::background::BackgroundTasks;

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// Deliberately vague: callers must not learn whether a claim exists.
    #[error("Couldn't send image.")]
    Rejected,

    #[error("No pending image")]
    NotFound,

    #[error("Claim store error: {0}")]
    Claim(ClaimError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),
}

impl From<ClaimError> for AttachmentError {
    fn from(e: ClaimError) -> Self {
        match e {
            ClaimError::NotFound => AttachmentError::NotFound,
            other => AttachmentError::Claim(other),
        }
    }
}

pub struct AttachmentService {
    claims: Arc<dyn AttachmentClaims>,
    blobs: Arc<dyn BlobStore>,
    background: BackgroundTasks,
}

impl AttachmentService {
    pub fn new(
        claims: Arc<dyn AttachmentClaims>,
        blobs: Arc<dyn BlobStore>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            claims,
            blobs,
            background,
        }
    }

    /// Store an uploaded image and claim it for `owner`.
    pub async fn upload(
        &self,
        owner: Snowflake,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AttachmentError> {
        let path = self.blobs.put(filename, bytes).await?;
        self.issue_claim(owner, &path).await?;
        Ok(path)
    }

    /// Register `path` as the owner's pending image.
    ///
    /// A superseded blob is deleted in the background. If the claim cannot be
    /// recorded, `path` itself is deleted so the upload is not orphaned.
    pub async fn issue_claim(&self, owner: Snowflake, path: &str) -> Result<(), AttachmentError> {
        match self.claims.issue(owner, path).await {
            Ok(Some(previous)) if previous != path => {
                debug!(owner = %owner, previous = %previous, "Superseding pending image");
                self.schedule_blob_delete(previous);
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(owner = %owner, error = %e, "Failed to issue attachment claim");
                self.schedule_blob_delete(path.to_owned());
                Err(e.into())
            }
        }
    }

    /// Check that `path` is the owner's current claim. Leaves the claim intact.
    pub async fn verify(&self, owner: Snowflake, path: &str) -> Result<(), AttachmentError> {
        match self.claims.get(owner).await {
            Ok(claimed) if claimed == path => Ok(()),
            Ok(_) | Err(ClaimError::NotFound) => Err(AttachmentError::Rejected),
            Err(e) => {
                warn!(owner = %owner, error = %e, "Claim lookup failed");
                Err(AttachmentError::Rejected)
            }
        }
    }

    /// Consume the owner's claim after its image was persisted.
    pub fn release(&self, owner: Snowflake) -> JoinHandle<()> {
        let claims = self.claims.clone();
        self.background
            .spawn("consume_claim", async move { claims.consume(owner).await })
    }

    /// Delete the owner's pending image and its claim.
    pub async fn discard_current(&self, owner: Snowflake) -> Result<(), AttachmentError> {
        let path = self.claims.get(owner).await?;
        self.blobs.delete(&path).await?;
        self.claims.consume(owner).await?;
        Ok(())
    }

    /// Clean up after an expired active key. Returns whether a blob was reaped.
    pub async fn reclaim_expired(&self, owner: Snowflake) -> Result<bool, AttachmentError> {
        let Some(path) = self.claims.orphaned(owner).await? else {
            return Ok(false);
        };
        self.blobs.delete(&path).await?;
        self.claims.discard(owner, &path).await?;
        debug!(owner = %owner, path = %path, "Reclaimed expired image");
        Ok(true)
    }

    /// Fire-and-forget version of `reclaim_expired` for the expiry watcher.
    pub fn spawn_reclaim(self: &Arc<Self>, owner: Snowflake) -> JoinHandle<()> {
        let this = Arc::clone(self);
        self.background.spawn("reclaim_expired", async move {
            this.reclaim_expired(owner).await.map(|_| ())
        })
    }

    /// Delete a blob in the background.
    pub fn schedule_blob_delete(&self, path: String) -> JoinHandle<()> {
        let blobs = self.blobs.clone();
        self.background
            .spawn("blob_delete", async move { blobs.delete(&path).await })
    }
}
