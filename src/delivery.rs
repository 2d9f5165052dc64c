//! Delivery sinks for assembled packs
//!
//! The orchestrator hands over pack bytes and a storage path, and gets a
//! retrievable URL back. Two backends: local disk (served by this process
//! at /downloads/*) and an HTTP object store. `remove` exists only for
//! best-effort compensation after a post-charge failure.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

use crate::types::{ConvertError, Result};

/// Storage backend for output packs.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Store `bytes` at `path` (relative, forward-slash) and return the
    /// URL a client can download it from.
    async fn store(&self, path: &str, bytes: &[u8]) -> Result<String>;

    /// Best-effort removal of a previously stored artifact. Errors are
    /// logged by implementations, never propagated.
    async fn remove(&self, path: &str);
}

/// Reject traversal components so a storage path can never escape the root.
fn safe_relative(path: &str) -> Result<PathBuf> {
    let rel = Path::new(path);
    let mut out = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            _ => {
                return Err(ConvertError::Internal(format!(
                    "unsafe storage path: {}",
                    path
                )))
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(ConvertError::Internal("empty storage path".to_string()));
    }
    Ok(out)
}

/// Writes packs under a local directory; the HTTP server exposes them at
/// `GET /downloads/{path}`.
pub struct LocalDiskSink {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskSink {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a download path for serving; `None` when the path is unsafe
    /// or outside the root.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        safe_relative(path).ok().map(|rel| self.root.join(rel))
    }
}

#[async_trait]
impl DeliverySink for LocalDiskSink {
    async fn store(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let full = self.root.join(safe_relative(path)?);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::DeliveryFailed(format!("mkdir: {}", e)))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| ConvertError::DeliveryFailed(format!("write: {}", e)))?;

        info!(path = %path, size = bytes.len(), "pack stored on local disk");
        Ok(format!("{}/downloads/{}", self.public_base_url, path))
    }

    async fn remove(&self, path: &str) {
        let Ok(rel) = safe_relative(path) else { return };
        let full = self.root.join(rel);
        if let Err(e) = tokio::fs::remove_file(&full).await {
            warn!(path = %path, error = %e, "compensating removal failed");
        }
        // Leave the parent uuid directory behind; it is empty and harmless.
    }
}

/// Uploads packs to a Supabase-storage-style HTTP object store.
pub struct ObjectStoreSink {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl ObjectStoreSink {
    pub fn new(base_url: &str, bucket: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        }
    }
}

#[async_trait]
impl DeliverySink for ObjectStoreSink {
    async fn store(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/zip")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ConvertError::DeliveryFailed(format!("upload: {}", e)))?;

        if !response.status().is_success() {
            return Err(ConvertError::DeliveryFailed(format!(
                "upload returned {}",
                response.status()
            )));
        }

        info!(path = %path, size = bytes.len(), "pack uploaded to object store");
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        ))
    }

    async fn remove(&self, path: &str) {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        );
        let result = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => warn!(path = %path, status = %r.status(), "compensating delete rejected"),
            Err(e) => warn!(path = %path, error = %e, "compensating delete failed"),
        }
    }
}
