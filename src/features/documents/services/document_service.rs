use std::sync::Arc;

use tracing::{debug, error, info};

use crate::core::config::UploadConfig;
use crate::core::error::{AppError, Result};
use crate::features::documents::dtos::{
    FileMetadataDto, FileStatsDto, StorageUsageDto, UpdateMetadataDto,
};
use crate::features::documents::services::upload_gateway::{
    IncomingFile, UploadGateway, UploadPolicy, UploadRequest,
};
use crate::modules::storage::{
    BlobSink, FileMetadata, FileRecord, MaterializedDownload, StoreError, TieredStore,
};

/// Upload, download and listing of civic documents
pub struct DocumentService {
    gateway: UploadGateway,
    store: Arc<TieredStore>,
    sink: Arc<dyn BlobSink>,
    upload_config: UploadConfig,
}

impl DocumentService {
    pub fn new(
        gateway: UploadGateway,
        store: Arc<TieredStore>,
        sink: Arc<dyn BlobSink>,
        upload_config: UploadConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            sink,
            upload_config,
        }
    }

    /// Largest file any category accepts
    pub fn max_upload_size(&self) -> u64 {
        self.upload_config
            .category_max_sizes
            .values()
            .copied()
            .chain(std::iter::once(self.upload_config.max_file_size))
            .max()
            .unwrap_or(self.upload_config.max_file_size)
    }

    pub fn upload_policy(&self, category: &str) -> UploadPolicy {
        UploadPolicy::for_category(&self.upload_config, category)
    }

    pub async fn upload_file(
        &self,
        file: IncomingFile,
        request: UploadRequest,
    ) -> Result<FileMetadataDto> {
        let policy = self.upload_policy(&request.category);
        let metadata = self.gateway.upload(file, request, &policy).await?;
        Ok(metadata.into())
    }

    /// Count one download and hand the payload over.
    ///
    /// The record is read before the counter moves, so a corrupt record never
    /// increments it.
    pub async fn record_download(&self, id: &str) -> Result<FileRecord> {
        let record = match self.store.get_by_id(id).await {
            Ok(resolved) => resolved
                .into_value()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?,
            Err(e @ StoreError::DataCorruption { .. }) => {
                error!(file_id = %id, error = %e, "Refusing to serve corrupt document");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = self.store.increment_download_count(id).await?.into_value();

        info!(
            file_id = %id,
            download_count = metadata.download_count,
            "Download recorded"
        );

        Ok(FileRecord {
            metadata,
            payload: record.payload,
        })
    }

    /// Count the download and expose the bytes at a transient URL
    pub async fn download_file(&self, id: &str) -> Result<MaterializedDownload> {
        let record = self.record_download(id).await?;
        let download = self
            .sink
            .materialize_download(
                record.payload,
                &record.metadata.original_name,
                &record.metadata.mime_type,
            )
            .await?;

        debug!(
            file_id = %id,
            path = %download.path.display(),
            mime_type = %download.mime_type,
            size = download.size,
            "Download materialized"
        );
        Ok(download)
    }

    pub async fn get_file(&self, id: &str) -> Result<FileMetadataDto> {
        let record = self
            .store
            .get_by_id(id)
            .await?
            .into_value()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Ok(record.metadata.into())
    }

    /// Documents in `category`, newest first
    pub async fn get_files_by_category(&self, category: &str) -> Result<Vec<FileMetadataDto>> {
        UploadGateway::validate_category(category)?;

        let files = self.store.get_by_category(category).await?.into_value();
        Ok(files.into_iter().map(FileMetadataDto::from).collect())
    }

    pub async fn list_files(&self) -> Result<Vec<FileMetadataDto>> {
        let files = self.store.list_all().await?.into_value();
        Ok(files.into_iter().map(FileMetadataDto::from).collect())
    }

    pub async fn get_file_stats(&self) -> Result<FileStatsDto> {
        let files: Vec<FileMetadata> = self.store.list_all().await?.into_value();
        Ok(FileStatsDto::from_metadata(&files))
    }

    pub async fn update_metadata(
        &self,
        id: &str,
        dto: UpdateMetadataDto,
    ) -> Result<FileMetadataDto> {
        let patch = dto.into_patch();
        if patch.is_empty() {
            return Err(AppError::Validation(
                "At least one of description, author, tags or subcategory is required"
                    .to_string(),
            ));
        }

        let metadata = self
            .store
            .update_metadata(id, &patch)
            .await?
            .into_value();

        info!(file_id = %id, "Document metadata updated");
        Ok(metadata.into())
    }

    pub async fn delete_file(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!(file_id = %id, "Document deleted");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        info!("All documents cleared");
        Ok(())
    }

    pub async fn storage_usage(&self) -> StorageUsageDto {
        let estimate = self.store.estimate_usage().await;
        StorageUsageDto {
            used_bytes: estimate.used_bytes,
            quota_bytes: estimate.quota_bytes,
            primary_state: self.store.primary_state(),
            fallback_state: self.store.fallback_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::documents::dtos::MetadataOverrides;
    use crate::modules::storage::{ObjectStore, StoreState, ValidationError};
    use crate::shared::test_helpers::{document_service, sample_record};
    use futures::future::join_all;

    fn pdf(bytes: &[u8]) -> IncomingFile {
        IncomingFile {
            original_name: "bylaws.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn request(category: &str) -> UploadRequest {
        UploadRequest {
            category: category.to_string(),
            subcategory: None,
            overrides: MetadataOverrides::default(),
        }
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"%PDF-1.7 bylaws"), request("constitution"))
            .await
            .unwrap();

        let record = service.record_download(&uploaded.id).await.unwrap();
        assert_eq!(record.payload, b"%PDF-1.7 bylaws");
        assert_eq!(record.metadata.download_count, 1);
        assert_eq!(record.metadata.upload_date, uploaded.upload_date);
    }

    #[tokio::test]
    async fn test_sequential_downloads_are_counted() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"guide"), request("voter-guide"))
            .await
            .unwrap();

        for _ in 0..10 {
            service.record_download(&uploaded.id).await.unwrap();
        }

        let file = service.get_file(&uploaded.id).await.unwrap();
        assert_eq!(file.download_count, 10);
    }

    #[tokio::test]
    async fn test_concurrent_downloads_are_counted() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"guide"), request("voter-guide"))
            .await
            .unwrap();

        let results = join_all((0..20).map(|_| {
            let service = Arc::clone(&service);
            let id = uploaded.id.clone();
            async move { service.record_download(&id).await }
        }))
        .await;
        assert!(results.iter().all(|r| r.is_ok()));

        let file = service.get_file(&uploaded.id).await.unwrap();
        assert_eq!(file.download_count, 20);
    }

    #[tokio::test]
    async fn test_download_unknown_is_not_found() {
        let (service, _) = document_service();
        let result = service.record_download("missing").await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_download_leaves_count_unchanged() {
        let (service, store) = document_service();
        let record = sample_record("research", b"payload".to_vec());
        store.put(&record).await.unwrap();

        let pool = store.pool().await.unwrap();
        sqlx::query("DELETE FROM document_payloads WHERE id = ?")
            .bind(record.id())
            .execute(&pool)
            .await
            .unwrap();

        let result = service.record_download(record.id()).await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::DataCorruption { .. }))
        ));

        let count: i64 = sqlx::query_scalar("SELECT download_count FROM documents WHERE id = ?")
            .bind(record.id())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_empty_record_is_not_served() {
        let (service, store) = document_service();
        let record = sample_record("research", Vec::new());
        store.put(&record).await.unwrap();

        let result = service.record_download(record.id()).await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::DataCorruption { .. }))
        ));

        let stored = store.list_all().await.unwrap();
        assert_eq!(stored[0].download_count, 0);
    }

    #[tokio::test]
    async fn test_download_file_materializes_payload() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"%PDF research"), request("research"))
            .await
            .unwrap();

        let download = service.download_file(&uploaded.id).await.unwrap();
        assert!(download.url.starts_with("/downloads/"));
        assert!(download.url.ends_with("/bylaws.pdf"));
        assert_eq!(
            tokio::fs::read(&download.path).await.unwrap(),
            b"%PDF research"
        );
    }

    #[tokio::test]
    async fn test_upload_validation_uses_category_limit() {
        let (service, _) = document_service();
        let result = service
            .upload_file(
                IncomingFile {
                    original_name: "scan.png".to_string(),
                    mime_type: "image/png".to_string(),
                    bytes: vec![1, 2, 3],
                },
                request("research"),
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::ValidationFailed(
                ValidationError::UnsupportedMimeType { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn test_stats_are_consistent() {
        let (service, store) = document_service();
        for category in ["constitution", "research", "research", "voter-guide"] {
            service
                .upload_file(pdf(b"doc"), request(category))
                .await
                .unwrap();
        }
        let first = service.list_files().await.unwrap().remove(0);
        service.record_download(&first.id).await.unwrap();
        service.record_download(&first.id).await.unwrap();

        let stats = service.get_file_stats().await.unwrap();
        let all = store.list_all().await.unwrap();

        assert_eq!(stats.total_files, all.len() as u64);
        assert_eq!(stats.files_by_category.values().sum::<u64>(), stats.total_files);
        assert_eq!(stats.files_by_category.get("research"), Some(&2));
        assert_eq!(stats.total_downloads, 2);

        service.delete_file(&first.id).await.unwrap();
        service.delete_file("never-uploaded").await.unwrap();

        let stats = service.get_file_stats().await.unwrap();
        let all = store.list_all().await.unwrap();

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_files, all.len() as u64);
        assert_eq!(stats.files_by_category.values().sum::<u64>(), stats.total_files);
        assert_eq!(stats.total_downloads, 0);
        assert!(all.iter().all(|m| m.id != first.id));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"doc"), request("constitution"))
            .await
            .unwrap();

        service.delete_file(&uploaded.id).await.unwrap();
        service.delete_file(&uploaded.id).await.unwrap();

        assert!(matches!(
            service.get_file(&uploaded.id).await,
            Err(AppError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_metadata_requires_a_field() {
        let (service, _) = document_service();
        let uploaded = service
            .upload_file(pdf(b"doc"), request("constitution"))
            .await
            .unwrap();

        let result = service
            .update_metadata(&uploaded.id, UpdateMetadataDto::default())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let updated = service
            .update_metadata(
                &uploaded.id,
                UpdateMetadataDto {
                    author: Some("Secretary".to_string()),
                    ..UpdateMetadataDto::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.author, "Secretary");
        assert!(updated.last_modified >= uploaded.last_modified);
    }

    #[tokio::test]
    async fn test_category_listing_rejects_bad_slug() {
        let (service, _) = document_service();
        let result = service.get_files_by_category("../etc").await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::ValidationFailed(
                ValidationError::InvalidCategory(_)
            )))
        ));
    }

    #[tokio::test]
    async fn test_storage_usage_reports_state() {
        let (service, _) = document_service();
        service
            .upload_file(pdf(b"doc"), request("constitution"))
            .await
            .unwrap();

        let usage = service.storage_usage().await;
        assert_eq!(usage.primary_state, StoreState::Ready);
        assert_eq!(usage.fallback_state, None);
        assert!(usage.used_bytes > 0);
    }
}
