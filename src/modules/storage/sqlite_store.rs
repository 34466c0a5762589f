//! SQLite-backed document store
//!
//! Metadata lives in `documents`, raw bytes in `document_payloads`; every
//! mutation touching both runs inside one sqlx transaction. The connection
//! pool is opened lazily on first use and memoized, so concurrent first
//! callers share a single open + migrate.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info, warn};

use super::error::{StoreError, StoreResult, ValidationError};
use super::object_store::{ObjectStore, StoreState};
use super::record::{
    format_timestamp, parse_timestamp, FileMetadata, FileRecord, MetadataPatch, StorageEstimate,
};
use crate::core::config::StoreConfig;
use crate::core::database;

/// Outcome of the one-time open; an error is kept so later calls fail fast
type OpenResult = Result<SqlitePool, String>;

const DOCUMENT_COLUMNS: &str = "id, stored_name, original_name, storage_path, size, mime_type, \
     category, subcategory, description, author, tags, upload_date, last_modified, \
     download_count, is_public";

const UPSERT_DOCUMENT: &str = r#"
    INSERT INTO documents (
        id, stored_name, original_name, storage_path, size, mime_type, category, subcategory,
        description, author, tags, upload_date, last_modified, download_count, is_public
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
    ON CONFLICT(id) DO UPDATE SET
        stored_name = excluded.stored_name,
        original_name = excluded.original_name,
        storage_path = excluded.storage_path,
        size = excluded.size,
        mime_type = excluded.mime_type,
        category = excluded.category,
        subcategory = excluded.subcategory,
        description = excluded.description,
        author = excluded.author,
        tags = excluded.tags,
        upload_date = excluded.upload_date,
        last_modified = excluded.last_modified,
        download_count = excluded.download_count,
        is_public = excluded.is_public
"#;

const UPSERT_PAYLOAD: &str = r#"
    INSERT INTO document_payloads (id, data)
    VALUES (?1, ?2)
    ON CONFLICT(id) DO UPDATE SET data = excluded.data
"#;

/// Database row for the `documents` table
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    stored_name: String,
    original_name: String,
    storage_path: String,
    size: i64,
    mime_type: String,
    category: String,
    subcategory: Option<String>,
    description: String,
    author: String,
    tags: String,
    upload_date: String,
    last_modified: String,
    download_count: i64,
    is_public: bool,
}

impl DocumentRow {
    fn into_metadata(self) -> StoreResult<FileMetadata> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| corruption(&self.id, format!("unreadable tags: {}", e)))?;
        let upload_date = parse_timestamp(&self.upload_date)
            .map_err(|e| corruption(&self.id, format!("unreadable upload_date: {}", e)))?;
        let last_modified = parse_timestamp(&self.last_modified)
            .map_err(|e| corruption(&self.id, format!("unreadable last_modified: {}", e)))?;

        Ok(FileMetadata {
            id: self.id,
            stored_name: self.stored_name,
            original_name: self.original_name,
            storage_path: self.storage_path,
            size: self.size.max(0) as u64,
            mime_type: self.mime_type,
            category: self.category,
            subcategory: self.subcategory,
            description: self.description,
            author: self.author,
            tags,
            upload_date,
            last_modified,
            download_count: self.download_count.max(0) as u64,
            is_public: self.is_public,
        })
    }
}

fn corruption(id: &str, reason: impl Into<String>) -> StoreError {
    StoreError::DataCorruption {
        id: id.to_string(),
        reason: reason.into(),
    }
}

fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Document store on top of a lazily opened sqlx SQLite pool
pub struct SqliteObjectStore {
    name: String,
    config: StoreConfig,
    handle: RwLock<Arc<OnceCell<OpenResult>>>,
    state: AtomicU8,
    open_attempts: AtomicUsize,
}

impl SqliteObjectStore {
    pub fn new(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            name: name.into(),
            config,
            handle: RwLock::new(Arc::new(OnceCell::new())),
            state: AtomicU8::new(StoreState::Closed as u8),
            open_attempts: AtomicUsize::new(0),
        }
    }

    /// Number of times the database has actually been opened
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: StoreState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Ready pool, opening the database on first call.
    ///
    /// A failed open is remembered: every later call returns `StorageUnavailable`
    /// without touching the engine again until `close` resets the store.
    pub async fn pool(&self) -> StoreResult<SqlitePool> {
        let cell = Arc::clone(&*self.handle.read().await);
        match cell.get_or_init(|| self.open(&cell)).await {
            Ok(pool) => Ok(pool.clone()),
            Err(reason) => Err(StoreError::StorageUnavailable(reason.clone())),
        }
    }

    async fn open(&self, cell: &Arc<OnceCell<OpenResult>>) -> OpenResult {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        self.set_state(StoreState::Opening);
        info!(store = %self.name, url = %self.config.url, "Opening document store");

        let result = self.connect_and_migrate().await;
        self.finish_open(cell, result).await
    }

    /// Publish the outcome of an open, unless `close` replaced the cell meanwhile
    async fn finish_open(
        &self,
        cell: &Arc<OnceCell<OpenResult>>,
        result: Result<SqlitePool, String>,
    ) -> OpenResult {
        let handle = self.handle.read().await;
        if !Arc::ptr_eq(&*handle, cell) {
            if let Ok(pool) = result {
                pool.close().await;
            }
            debug!(store = %self.name, "Open finished after close; discarding pool");
            return Err("store was closed while opening".to_string());
        }

        match result {
            Ok(pool) => {
                self.set_state(StoreState::Ready);
                info!(store = %self.name, "Document store ready");
                Ok(pool)
            }
            Err(reason) => {
                self.set_state(StoreState::Error);
                error!(store = %self.name, error = %reason, "Document store failed to open");
                Err(reason)
            }
        }
    }

    async fn connect_and_migrate(&self) -> Result<SqlitePool, String> {
        if let Some(path) = self.config.database_path() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    format!("failed to create directory {}: {}", parent.display(), e)
                })?;
            }
        }

        let pool = database::create_pool(&self.config)
            .await
            .map_err(|e| format!("failed to open database: {}", e))?;

        if let Err(e) = database::run_migrations(&pool).await {
            pool.close().await;
            return Err(format!("schema migration failed: {}", e));
        }

        Ok(pool)
    }

    async fn try_estimate_usage(&self) -> StoreResult<StorageEstimate> {
        let pool = self.pool().await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&pool)
            .await?;
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&pool)
            .await?;
        let max_page_count: i64 = sqlx::query_scalar("PRAGMA max_page_count")
            .fetch_one(&pool)
            .await?;

        Ok(StorageEstimate {
            used_bytes: page_count.saturating_mul(page_size).max(0) as u64,
            quota_bytes: max_page_count.saturating_mul(page_size).max(0) as u64,
        })
    }
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StoreState {
        StoreState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn close(&self) {
        let mut handle = self.handle.write().await;
        if let Some(Ok(pool)) = handle.get() {
            pool.close().await;
        }
        *handle = Arc::new(OnceCell::new());
        self.set_state(StoreState::Closed);
        info!(store = %self.name, "Document store closed");
    }

    async fn put(&self, record: &FileRecord) -> StoreResult<()> {
        let metadata = &record.metadata;
        let actual = record.payload.len() as u64;
        if metadata.size != actual {
            return Err(ValidationError::SizeMismatch {
                declared: metadata.size,
                actual,
            }
            .into());
        }

        let pool = self.pool().await?;

        let mut tx = pool.begin().await?;
        sqlx::query(UPSERT_DOCUMENT)
            .bind(&metadata.id)
            .bind(&metadata.stored_name)
            .bind(&metadata.original_name)
            .bind(&metadata.storage_path)
            .bind(metadata.size as i64)
            .bind(&metadata.mime_type)
            .bind(&metadata.category)
            .bind(metadata.subcategory.as_deref())
            .bind(&metadata.description)
            .bind(&metadata.author)
            .bind(encode_tags(&metadata.tags))
            .bind(format_timestamp(&metadata.upload_date))
            .bind(format_timestamp(&metadata.last_modified))
            .bind(metadata.download_count as i64)
            .bind(metadata.is_public)
            .execute(&mut *tx)
            .await?;
        sqlx::query(UPSERT_PAYLOAD)
            .bind(&metadata.id)
            .bind(record.payload.as_slice())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(
            store = %self.name,
            id = %metadata.id,
            category = %metadata.category,
            size = metadata.size,
            "Document stored"
        );
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<FileRecord>> {
        let pool = self.pool().await?;

        // Both reads share one transaction so a concurrent delete cannot look like corruption
        let mut tx = pool.begin().await?;
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = ?1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT data FROM document_payloads WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;

        let metadata = row.into_metadata()?;
        match payload {
            None => {
                error!(store = %self.name, id = %id, "Document metadata has no payload");
                Err(corruption(id, "payload missing"))
            }
            Some(bytes) if bytes.is_empty() => {
                error!(store = %self.name, id = %id, "Document payload is empty");
                Err(corruption(id, "payload is empty"))
            }
            Some(bytes) if bytes.len() as u64 != metadata.size => {
                error!(
                    store = %self.name,
                    id = %id,
                    expected = metadata.size,
                    actual = bytes.len(),
                    "Document payload size mismatch"
                );
                Err(corruption(
                    id,
                    format!(
                        "payload is {} bytes but metadata records {}",
                        bytes.len(),
                        metadata.size
                    ),
                ))
            }
            Some(bytes) => Ok(Some(FileRecord {
                metadata,
                payload: bytes,
            })),
        }
    }

    async fn get_by_category(&self, category: &str) -> StoreResult<Vec<FileMetadata>> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE category = ?1 ORDER BY upload_date DESC, id DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(category)
        .fetch_all(&pool)
        .await?;

        rows.into_iter().map(DocumentRow::into_metadata).collect()
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let pool = self.pool().await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM document_payloads WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if removed > 0 {
            info!(store = %self.name, id = %id, "Document deleted");
        } else {
            debug!(store = %self.name, id = %id, "Delete of unknown document ignored");
        }
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<FileMetadata>> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents ORDER BY upload_date DESC, id DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&pool)
        .await?;

        rows.into_iter().map(DocumentRow::into_metadata).collect()
    }

    async fn clear(&self) -> StoreResult<()> {
        let pool = self.pool().await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM document_payloads")
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        warn!(store = %self.name, removed, "Document store cleared");
        Ok(())
    }

    async fn increment_download_count(&self, id: &str) -> StoreResult<FileMetadata> {
        let pool = self.pool().await?;
        let now = format_timestamp(&Utc::now());

        // Single UPDATE: SQLite serializes writers, so concurrent increments all land
        let mut tx = pool.begin().await?;
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents
             SET download_count = download_count + 1, last_modified = ?1
             WHERE id = ?2
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_metadata()
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> StoreResult<FileMetadata> {
        let pool = self.pool().await?;
        let now = format_timestamp(&Utc::now());
        let tags = patch.tags.as_deref().map(encode_tags);

        let mut tx = pool.begin().await?;
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents
             SET description = COALESCE(?1, description),
                 author = COALESCE(?2, author),
                 tags = COALESCE(?3, tags),
                 subcategory = COALESCE(?4, subcategory),
                 last_modified = ?5
             WHERE id = ?6
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(patch.description.as_deref())
        .bind(patch.author.as_deref())
        .bind(tags)
        .bind(patch.subcategory.as_deref())
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let metadata = row
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_metadata()?;
        info!(store = %self.name, id = %id, "Document metadata updated");
        Ok(metadata)
    }

    async fn estimate_usage(&self) -> StorageEstimate {
        match self.try_estimate_usage().await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(store = %self.name, error = %e, "Storage estimate unavailable");
                StorageEstimate::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{memory_store, sample_record, sample_record_at};
    use chrono::{Duration, TimeZone};
    use futures::future::join_all;

    #[tokio::test]
    async fn test_round_trip_preserves_metadata_and_bytes() {
        let store = memory_store();
        let record = sample_record("constitution", b"%PDF-1.7 bylaws".to_vec());

        store.put(&record).await.unwrap();
        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();

        assert_eq!(fetched.metadata, record.metadata);
        assert_eq!(fetched.payload, record.payload);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let store = memory_store();
        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = memory_store();
        let mut record = sample_record("voter-guide", b"first".to_vec());
        store.put(&record).await.unwrap();

        record.metadata.description = "Revised guide".to_string();
        record.payload = b"second edition".to_vec();
        record.metadata.size = record.payload.len() as u64;
        store.put(&record).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.metadata.description, "Revised guide");
        assert_eq!(fetched.payload, b"second edition");
    }

    #[tokio::test]
    async fn test_category_lookup_is_newest_first() {
        let store = memory_store();
        let t1 = Utc.with_ymd_and_hms(2023, 1, 10, 8, 0, 0).unwrap();
        let t2 = t1 + Duration::days(30);
        let t3 = t2 + Duration::days(30);

        let first = sample_record_at("research", t1);
        let second = sample_record_at("research", t2);
        let third = sample_record_at("research", t3);
        let other = sample_record_at("constitution", t3);

        // Insert out of order to make sure ordering comes from the query
        for record in [&second, &other, &first, &third] {
            store.put(record).await.unwrap();
        }

        let ids: Vec<String> = store
            .get_by_category("research")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(
            ids,
            vec![third.id().to_string(), second.id().to_string(), first.id().to_string()]
        );
        assert!(store.get_by_category("press").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_increments() {
        let store = memory_store();
        let record = sample_record("constitution", b"text".to_vec());
        store.put(&record).await.unwrap();

        for _ in 0..5 {
            store.increment_download_count(record.id()).await.unwrap();
        }

        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.metadata.download_count, 5);
        assert!(fetched.metadata.last_modified >= record.metadata.last_modified);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = memory_store();
        let record = sample_record("constitution", b"text".to_vec());
        store.put(&record).await.unwrap();

        let results =
            join_all((0..25).map(|_| store.increment_download_count(record.id()))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.metadata.download_count, 25);
    }

    #[tokio::test]
    async fn test_increment_unknown_id_is_not_found() {
        let store = memory_store();
        let result = store.increment_download_count("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = memory_store();
        let record = sample_record("research", b"paper".to_vec());
        store.put(&record).await.unwrap();

        store.delete(record.id()).await.unwrap();
        assert!(store.get_by_id(record.id()).await.unwrap().is_none());

        store.delete(record.id()).await.unwrap();
        assert!(store.get_by_id(record.id()).await.unwrap().is_none());

        let pool = store.pool().await.unwrap();
        let payloads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_payloads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(payloads, 0);
    }

    #[tokio::test]
    async fn test_metadata_without_payload_is_corruption() {
        let store = memory_store();
        let record = sample_record("voter-guide", b"guide".to_vec());
        store.put(&record).await.unwrap();

        let pool = store.pool().await.unwrap();
        sqlx::query("DELETE FROM document_payloads WHERE id = ?1")
            .bind(record.id())
            .execute(&pool)
            .await
            .unwrap();

        let result = store.get_by_id(record.id()).await;
        assert!(matches!(result, Err(StoreError::DataCorruption { .. })));
    }

    #[tokio::test]
    async fn test_empty_payload_for_sized_record_is_corruption() {
        let store = memory_store();
        let record = sample_record("voter-guide", b"guide".to_vec());
        store.put(&record).await.unwrap();

        let pool = store.pool().await.unwrap();
        sqlx::query("UPDATE document_payloads SET data = x'' WHERE id = ?1")
            .bind(record.id())
            .execute(&pool)
            .await
            .unwrap();

        let result = store.get_by_id(record.id()).await;
        assert!(matches!(result, Err(StoreError::DataCorruption { .. })));
    }

    #[tokio::test]
    async fn test_empty_payload_is_corruption_even_when_size_is_zero() {
        let store = memory_store();
        let record = sample_record("voter-guide", b"guide".to_vec());
        store.put(&record).await.unwrap();

        let pool = store.pool().await.unwrap();
        sqlx::query("UPDATE documents SET size = 0 WHERE id = ?1")
            .bind(record.id())
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE document_payloads SET data = x'' WHERE id = ?1")
            .bind(record.id())
            .execute(&pool)
            .await
            .unwrap();

        let result = store.get_by_id(record.id()).await;
        assert!(matches!(result, Err(StoreError::DataCorruption { .. })));
    }

    #[tokio::test]
    async fn test_put_rejects_size_mismatch() {
        let store = memory_store();
        let mut record = sample_record("research", b"paper".to_vec());
        record.metadata.size = 99;

        let result = store.put(&record).await;
        assert!(matches!(
            result,
            Err(StoreError::ValidationFailed(ValidationError::SizeMismatch {
                declared: 99,
                actual: 5
            }))
        ));
        assert_eq!(store.open_attempts(), 0);
    }

    #[tokio::test]
    async fn test_round_trip_keeps_sub_millisecond_timestamps() {
        let store = memory_store();
        let mut record = sample_record("research", b"paper".to_vec());
        let now = Utc::now();
        record.metadata.upload_date = now + Duration::nanoseconds(123_457);
        record.metadata.last_modified = now + Duration::nanoseconds(987_654_321);

        store.put(&record).await.unwrap();
        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();

        assert_eq!(fetched.metadata, record.metadata);
    }

    #[tokio::test]
    async fn test_open_finishing_after_close_does_not_report_ready() {
        let store = memory_store();
        let stale = Arc::clone(&*store.handle.read().await);
        store.close().await;

        let pool = database::create_pool(&StoreConfig::with_url("sqlite::memory:"))
            .await
            .unwrap();
        let result = store.finish_open(&stale, Ok(pool)).await;

        assert!(result.is_err());
        assert_eq!(store.state(), StoreState::Closed);

        store.list_all().await.unwrap();
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let store = memory_store();
        let record = sample_record("research", b"paper".to_vec());
        store.put(&record).await.unwrap();

        let patch = MetadataPatch {
            description: Some("Redistricting study".to_string()),
            tags: Some(vec!["maps".to_string(), "2024".to_string()]),
            ..Default::default()
        };
        let updated = store.update_metadata(record.id(), &patch).await.unwrap();

        assert_eq!(updated.description, "Redistricting study");
        assert_eq!(updated.tags, vec!["maps", "2024"]);
        assert_eq!(updated.author, record.metadata.author);
        assert_eq!(updated.upload_date, record.metadata.upload_date);
        assert_eq!(updated.download_count, 0);

        let missing = store.update_metadata("missing", &patch).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = memory_store();
        for category in ["constitution", "research", "research"] {
            store
                .put(&sample_record(category, b"bytes".to_vec()))
                .await
                .unwrap();
        }

        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_access_opens_once() {
        let store = memory_store();
        assert_eq!(store.state(), StoreState::Closed);

        let results = join_all((0..8).map(|_| store.list_all())).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(store.open_attempts(), 1);
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[tokio::test]
    async fn test_failed_open_is_sticky() {
        let store = SqliteObjectStore::new(
            "broken",
            StoreConfig::with_url("sqlite:///dev/null/documents.db"),
        );

        let first = store.list_all().await;
        assert!(matches!(first, Err(StoreError::StorageUnavailable(_))));
        assert_eq!(store.state(), StoreState::Error);

        let second = store.get_by_id("anything").await;
        assert!(matches!(second, Err(StoreError::StorageUnavailable(_))));
        assert_eq!(store.open_attempts(), 1);

        assert_eq!(store.estimate_usage().await, StorageEstimate::default());
    }

    #[tokio::test]
    async fn test_file_database_survives_close() {
        let dir = std::env::temp_dir().join(format!("civic-docs-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}/documents.db", dir.display());
        let store = SqliteObjectStore::new("file", StoreConfig::with_url(url));

        let record = sample_record("constitution", b"%PDF persisted".to_vec());
        store.put(&record).await.unwrap();
        store.close().await;
        assert_eq!(store.state(), StoreState::Closed);

        let fetched = store.get_by_id(record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.payload, record.payload);
        assert_eq!(store.open_attempts(), 2);

        store.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_full_database_reports_quota_exceeded() {
        let mut config = StoreConfig::with_url("sqlite::memory:");
        config.max_page_count = Some(16);
        let store = SqliteObjectStore::new("tiny", config);

        let record = sample_record("research", vec![7u8; 256 * 1024]);
        let result = store.put(&record).await;

        assert!(matches!(result, Err(StoreError::QuotaExceeded(_))));
    }

    #[tokio::test]
    async fn test_estimate_usage_reports_pages() {
        let store = memory_store();
        store
            .put(&sample_record("research", vec![1u8; 32 * 1024]))
            .await
            .unwrap();

        let estimate = store.estimate_usage().await;
        assert!(estimate.used_bytes >= 32 * 1024);
        assert!(estimate.quota_bytes >= estimate.used_bytes);
    }
}
