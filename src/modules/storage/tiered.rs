//! Two-tier store resolution
//!
//! Operations go to the primary store. When the primary cannot be opened
//! (`StorageUnavailable`) and a fallback is configured, the same operation is
//! repeated against the fallback and the primary's error travels back with
//! the result. Any other primary error is returned as is.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::error::{StoreError, StoreResult};
use super::object_store::{ObjectStore, StoreState};
use super::record::{FileMetadata, FileRecord, MetadataPatch, StorageEstimate};

/// Which tier answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Primary,
    Fallback,
}

/// A value plus where it came from
#[derive(Debug)]
pub struct Resolved<T> {
    pub value: T,
    pub backend: Backend,
    /// Why the primary was skipped, when the fallback answered
    pub primary_error: Option<String>,
}

impl<T> Resolved<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

pub struct TieredStore {
    primary: Arc<dyn ObjectStore>,
    fallback: Option<Arc<dyn ObjectStore>>,
}

impl TieredStore {
    pub fn new(primary: Arc<dyn ObjectStore>, fallback: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { primary, fallback }
    }

    #[cfg(test)]
    pub fn primary_only(primary: Arc<dyn ObjectStore>) -> Self {
        Self::new(primary, None)
    }

    pub fn primary_state(&self) -> StoreState {
        self.primary.state()
    }

    pub fn fallback_state(&self) -> Option<StoreState> {
        self.fallback.as_ref().map(|store| store.state())
    }

    /// Close both tiers
    pub async fn close(&self) {
        self.primary.close().await;
        if let Some(fallback) = &self.fallback {
            fallback.close().await;
        }
    }

    async fn resolve<T, F, Fut>(&self, operation: &str, op: F) -> StoreResult<Resolved<T>>
    where
        F: Fn(Arc<dyn ObjectStore>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let primary_err = match op(Arc::clone(&self.primary)).await {
            Ok(value) => {
                return Ok(Resolved {
                    value,
                    backend: Backend::Primary,
                    primary_error: None,
                })
            }
            Err(StoreError::StorageUnavailable(reason)) => reason,
            Err(e) => return Err(e),
        };

        let Some(fallback) = &self.fallback else {
            return Err(StoreError::StorageUnavailable(primary_err));
        };

        warn!(
            operation,
            primary = %self.primary.name(),
            fallback = %fallback.name(),
            error = %primary_err,
            "Primary store unavailable, using fallback"
        );

        let value = op(Arc::clone(fallback)).await?;
        Ok(Resolved {
            value,
            backend: Backend::Fallback,
            primary_error: Some(primary_err),
        })
    }

    pub async fn put(&self, record: &FileRecord) -> StoreResult<Resolved<()>> {
        self.resolve("put", |store| async move { store.put(record).await })
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> StoreResult<Resolved<Option<FileRecord>>> {
        self.resolve("get_by_id", |store| async move { store.get_by_id(id).await })
            .await
    }

    pub async fn get_by_category(&self, category: &str) -> StoreResult<Resolved<Vec<FileMetadata>>> {
        self.resolve("get_by_category", |store| async move {
            store.get_by_category(category).await
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<Resolved<()>> {
        self.resolve("delete", |store| async move { store.delete(id).await })
            .await
    }

    pub async fn list_all(&self) -> StoreResult<Resolved<Vec<FileMetadata>>> {
        self.resolve("list_all", |store| async move { store.list_all().await })
            .await
    }

    pub async fn clear(&self) -> StoreResult<Resolved<()>> {
        self.resolve("clear", |store| async move { store.clear().await })
            .await
    }

    pub async fn increment_download_count(&self, id: &str) -> StoreResult<Resolved<FileMetadata>> {
        self.resolve("increment_download_count", |store| async move {
            store.increment_download_count(id).await
        })
        .await
    }

    pub async fn update_metadata(
        &self,
        id: &str,
        patch: &MetadataPatch,
    ) -> StoreResult<Resolved<FileMetadata>> {
        self.resolve("update_metadata", |store| async move {
            store.update_metadata(id, patch).await
        })
        .await
    }

    /// Usage of the primary store; the fallback is asked only if the primary reports nothing
    pub async fn estimate_usage(&self) -> StorageEstimate {
        let estimate = self.primary.estimate_usage().await;
        match &self.fallback {
            Some(fallback) if estimate == StorageEstimate::default() => {
                fallback.estimate_usage().await
            }
            _ => estimate,
        }
    }
}
