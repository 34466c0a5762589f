use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use super::error::StoreResult;
use super::record::{FileMetadata, FileRecord, MetadataPatch, StorageEstimate};

/// Lifecycle of the underlying database handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Closed,
    Opening,
    Ready,
    Error,
}

impl StoreState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => StoreState::Opening,
            2 => StoreState::Ready,
            3 => StoreState::Error,
            _ => StoreState::Closed,
        }
    }
}

/// Persistent, transactional store of documents and their payloads.
///
/// Implementations must make `put`, `delete` and `increment_download_count`
/// atomic with respect to other calls on the same id.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Current point in the Closed → Opening → Ready | Error lifecycle
    fn state(&self) -> StoreState;

    /// Release the engine handle and return to `Closed`; the next operation reopens
    async fn close(&self);

    /// Insert or replace the record (metadata and payload) keyed by its id.
    /// `metadata.size` must equal the payload length.
    async fn put(&self, record: &FileRecord) -> StoreResult<()>;

    /// Point lookup. A metadata row without a matching payload is `DataCorruption`, not `None`.
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<FileRecord>>;

    /// Records in `category`, newest `upload_date` first
    async fn get_by_category(&self, category: &str) -> StoreResult<Vec<FileMetadata>>;

    /// Remove metadata and payload together. Missing ids are not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn list_all(&self) -> StoreResult<Vec<FileMetadata>>;

    async fn clear(&self) -> StoreResult<()>;

    /// Add one to the download counter and refresh `last_modified`
    async fn increment_download_count(&self, id: &str) -> StoreResult<FileMetadata>;

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> StoreResult<FileMetadata>;

    /// Never fails: zeros when the engine cannot report capacity
    async fn estimate_usage(&self) -> StorageEstimate;
}
