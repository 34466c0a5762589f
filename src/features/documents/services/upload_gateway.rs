use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::UploadConfig;
use crate::features::documents::dtos::{get_extension_from_content_type, MetadataOverrides};
use crate::modules::storage::{
    FileMetadata, FileRecord, StoreResult, TieredStore, ValidationError,
};
use crate::shared::constants::{
    DEFAULT_ALLOWED_MIME_TYPE, DEFAULT_MAX_FILE_SIZE, FALLBACK_EXTENSION,
};
use crate::shared::validation::CATEGORY_REGEX;

/// A file as received from the client
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// What an upload must satisfy. The caller decides the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub max_size_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mime_types: vec![DEFAULT_ALLOWED_MIME_TYPE.to_string()],
            max_size_bytes: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl UploadPolicy {
    pub fn for_category(config: &UploadConfig, category: &str) -> Self {
        Self {
            allowed_mime_types: config.allowed_mime_types.clone(),
            max_size_bytes: config.max_size_for(category),
        }
    }
}

/// Where an upload goes and what the caller says about it
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub category: String,
    pub subcategory: Option<String>,
    pub overrides: MetadataOverrides,
}

/// Validates incoming files and writes them through the tiered store
pub struct UploadGateway {
    store: Arc<TieredStore>,
}

impl UploadGateway {
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self { store }
    }

    /// MIME type first, then size; nothing is read from the store.
    /// An empty file is refused outright.
    pub fn validate(file: &IncomingFile, policy: &UploadPolicy) -> Result<(), ValidationError> {
        if !policy
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed == &file.mime_type)
        {
            return Err(ValidationError::UnsupportedMimeType {
                mime_type: file.mime_type.clone(),
                allowed: policy.allowed_mime_types.join(", "),
            });
        }

        if file.size() == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if file.size() > policy.max_size_bytes {
            return Err(ValidationError::TooLarge {
                size: file.size(),
                max_size: policy.max_size_bytes,
            });
        }

        Ok(())
    }

    pub fn validate_category(category: &str) -> Result<(), ValidationError> {
        if CATEGORY_REGEX.is_match(category) {
            Ok(())
        } else {
            Err(ValidationError::InvalidCategory(category.to_string()))
        }
    }

    /// Validate, stamp the computed fields and persist.
    ///
    /// The bytes move into the stored record; the returned metadata is what was written.
    pub async fn upload(
        &self,
        file: IncomingFile,
        request: UploadRequest,
        policy: &UploadPolicy,
    ) -> StoreResult<FileMetadata> {
        Self::validate(&file, policy)?;
        Self::validate_category(&request.category)?;

        let record = build_record(file, request);
        let resolved = self.store.put(&record).await?;

        info!(
            file_id = %record.id(),
            category = %record.metadata.category,
            size = record.metadata.size,
            backend = ?resolved.backend,
            primary_error = ?resolved.primary_error,
            "Document stored"
        );

        Ok(record.metadata)
    }
}

/// Time-ordered id: 48-bit millisecond timestamp followed by random bits
pub fn generate_file_id() -> String {
    Uuid::now_v7().to_string()
}

fn build_record(file: IncomingFile, request: UploadRequest) -> FileRecord {
    let now = Utc::now().trunc_subsecs(3);
    let extension = file_extension(&file.mime_type, &file.original_name);
    let stored_name = format!(
        "{}_{}.{}",
        request.category,
        now.timestamp_millis(),
        extension
    );
    let storage_path = format!("{}/{}", request.category, stored_name);
    let subcategory = request
        .subcategory
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    debug!(stored_name = %stored_name, "Building document record");

    FileRecord {
        metadata: FileMetadata {
            id: generate_file_id(),
            stored_name,
            original_name: file.original_name,
            storage_path,
            size: file.bytes.len() as u64,
            mime_type: file.mime_type,
            category: request.category,
            subcategory,
            description: request.overrides.description.unwrap_or_default(),
            author: request.overrides.author.unwrap_or_default(),
            tags: request.overrides.tags.unwrap_or_default(),
            upload_date: now,
            last_modified: now,
            download_count: 0,
            is_public: true,
        },
        payload: file.bytes,
    }
}

/// From the MIME type, then the original filename, else the fallback
fn file_extension(mime_type: &str, original_name: &str) -> String {
    if let Some(ext) = get_extension_from_content_type(mime_type) {
        return ext.to_string();
    }

    original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
