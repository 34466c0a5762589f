use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::Fake;
use uuid::Uuid;

use crate::core::config::{StoreConfig, UploadConfig};
use crate::features::documents::services::{DocumentService, UploadGateway};
use crate::modules::storage::{
    FileMetadata, FileRecord, SqliteObjectStore, TempDirBlobSink, TieredStore,
};

/// Fresh in-memory store; each call gets its own database
pub fn memory_store() -> Arc<SqliteObjectStore> {
    Arc::new(SqliteObjectStore::new(
        "memory",
        StoreConfig::with_url("sqlite::memory:"),
    ))
}

pub fn sample_record(category: &str, payload: Vec<u8>) -> FileRecord {
    sample_record_with(category, Utc::now(), payload)
}

pub fn sample_record_at(category: &str, upload_date: DateTime<Utc>) -> FileRecord {
    sample_record_with(category, upload_date, b"%PDF-1.7 sample".to_vec())
}

fn sample_record_with(category: &str, upload_date: DateTime<Utc>, payload: Vec<u8>) -> FileRecord {
    let stored_name = format!("{}_{}.pdf", category, upload_date.timestamp_millis());
    let tags: Vec<String> = (0..2).map(|_| Word().fake()).collect();

    FileRecord {
        metadata: FileMetadata {
            id: Uuid::now_v7().to_string(),
            storage_path: format!("{}/{}", category, stored_name),
            stored_name,
            original_name: "document.pdf".to_string(),
            size: payload.len() as u64,
            mime_type: "application/pdf".to_string(),
            category: category.to_string(),
            subcategory: None,
            description: Sentence(3..8).fake(),
            author: Name().fake(),
            tags,
            upload_date,
            last_modified: upload_date,
            download_count: 0,
            is_public: true,
        },
        payload,
    }
}

/// Sink writing under a unique temp directory
pub fn temp_sink() -> Arc<TempDirBlobSink> {
    let root = std::env::temp_dir().join(format!("civic-docs-test-{}", Uuid::new_v4()));
    Arc::new(TempDirBlobSink::new(
        root,
        "/downloads",
        Duration::from_secs(60),
    ))
}

/// Service over a fresh in-memory store, plus the store for direct inspection
pub fn document_service() -> (Arc<DocumentService>, Arc<SqliteObjectStore>) {
    let store = memory_store();
    let tiered = Arc::new(TieredStore::primary_only(store.clone()));
    let service = DocumentService::new(
        UploadGateway::new(Arc::clone(&tiered)),
        tiered,
        temp_sink(),
        UploadConfig::default(),
    );
    (Arc::new(service), store)
}
