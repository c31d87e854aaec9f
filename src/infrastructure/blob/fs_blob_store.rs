//! Local filesystem blob store.
//!
//! Paths handed out look like `{key_prefix}/{uuid}{name}` and are relative to
//! the configured root. A path is the only handle clients ever see, so every
//! path coming back in is checked before it touches the filesystem.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{BlobError, BlobStore};

const MAX_NAME_LEN: usize = 64;

pub struct FsBlobStore {
    root: PathBuf,
    key_prefix: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key_prefix: key_prefix.into().trim_matches('/').to_owned(),
        }
    }

    /// Absolute location of `path`, rejecting anything outside the prefix.
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let inside_prefix = relative.starts_with(&self.key_prefix);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !inside_prefix || !plain {
            return Err(BlobError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

/// Keep the tail of a client filename that is safe to embed in a path.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let start = cleaned.len().saturating_sub(MAX_NAME_LEN);
    cleaned[start..].to_owned()
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let path = format!("{}/{}{}", self.key_prefix, Uuid::new_v4(), sanitize_filename(filename));
        let target = self.resolve(&path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = target.with_extension("part");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;

        debug!(path = %path, "Blob stored");
        Ok(path)
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
