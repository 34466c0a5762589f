//! Materialization of downloaded payloads
//!
//! A `BlobSink` turns payload bytes into something a client can fetch. The
//! temp-dir sink writes the bytes under a random directory, hands back a
//! transient URL and removes the directory once the grace period elapses.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use crate::core::config::DownloadConfig;

/// A payload written out for a single download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedDownload {
    /// Transient URL the client fetches the bytes from
    pub url: String,
    /// Where the bytes were written
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Take ownership of `bytes` and expose them under `filename`
    async fn materialize_download(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> StoreResult<MaterializedDownload>;
}

/// Writes downloads to a local directory served under `url_prefix`
pub struct TempDirBlobSink {
    root: PathBuf,
    url_prefix: String,
    grace_period: Duration,
}

impl TempDirBlobSink {
    pub fn new(root: PathBuf, url_prefix: impl Into<String>, grace_period: Duration) -> Self {
        Self {
            root,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            grace_period,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(
            config.dir.clone(),
            config.url_prefix.clone(),
            config.grace_period,
        )
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Schedule removal of a materialized download directory
    fn release_after_grace(&self, dir: PathBuf) {
        let grace_period = self.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(dir = %dir.display(), "Released materialized download"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to release download"),
            }
        });
    }
}

#[async_trait]
impl BlobSink for TempDirBlobSink {
    async fn materialize_download(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> StoreResult<MaterializedDownload> {
        let token = Uuid::new_v4().simple().to_string();
        let filename = sanitize_filename(filename);
        let dir = self.root.join(&token);
        let path = dir.join(&filename);
        let size = bytes.len() as u64;

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::MaterializationFailed(format!(
                "failed to create {}: {}",
                dir.display(),
                e
            ))
        })?;
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            StoreError::MaterializationFailed(format!("failed to write {}: {}", path.display(), e))
        })?;

        self.release_after_grace(dir);

        Ok(MaterializedDownload {
            url: format!("{}/{}/{}", self.url_prefix, token, filename),
            path,
            mime_type: mime_type.to_string(),
            size,
        })
    }
}

/// Keep the last path component and replace anything outside `[A-Za-z0-9._-]`
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}
