use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::modules::storage::{FileMetadata, MetadataPatch, StoreState, ValidationError};
use crate::shared::constants::DOWNLOAD_PLACEHOLDER_PREFIX;
use crate::shared::validation::CATEGORY_REGEX;

/// Keys owned by the store. Accepted in both snake_case and camelCase so that
/// either spelling is refused rather than reported as unknown.
const COMPUTED_FIELDS: &[&str] = &[
    "id",
    "stored_name",
    "storedName",
    "original_name",
    "originalName",
    "storage_path",
    "storagePath",
    "size",
    "mime_type",
    "mimeType",
    "upload_date",
    "uploadDate",
    "last_modified",
    "lastModified",
    "download_count",
    "downloadCount",
    "is_public",
    "isPublic",
];

const OVERRIDE_FIELDS: &[&str] = &["description", "author", "tags"];

const EDITABLE_FIELDS: &[&str] = &["description", "author", "tags", "subcategory"];

/// Refuse computed and unknown keys before deserializing a JSON object
fn check_keys(object: &Map<String, Value>, allowed: &[&str]) -> Result<(), ValidationError> {
    for key in object.keys() {
        if allowed.contains(&key.as_str()) {
            continue;
        }
        if COMPUTED_FIELDS.contains(&key.as_str()) {
            return Err(ValidationError::ComputedField(key.clone()));
        }
        return Err(ValidationError::UnknownField(key.clone()));
    }
    Ok(())
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::InvalidMetadata("expected a JSON object".to_string()))
}

/// Document metadata as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileMetadataDto {
    /// Time-ordered document id (UUIDv7)
    pub id: String,
    pub stored_name: String,
    pub original_name: String,
    pub storage_path: String,
    /// Size in bytes
    pub size: u64,
    pub mime_type: String,
    #[schema(example = "constitution")]
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    pub upload_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub download_count: u64,
    pub is_public: bool,
}

impl From<FileMetadata> for FileMetadataDto {
    fn from(m: FileMetadata) -> Self {
        Self {
            id: m.id,
            stored_name: m.stored_name,
            original_name: m.original_name,
            storage_path: m.storage_path,
            size: m.size,
            mime_type: m.mime_type,
            category: m.category,
            subcategory: m.subcategory,
            description: m.description,
            author: m.author,
            tags: m.tags,
            upload_date: m.upload_date,
            last_modified: m.last_modified,
            download_count: m.download_count,
            is_public: m.is_public,
        }
    }
}

/// Upload document request DTO for OpenAPI documentation
/// Note: This struct is for OpenAPI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadDocumentDto {
    /// The document to upload
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub file: String,
    /// Category slug
    #[schema(example = "voter-guide")]
    pub category: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Comma separated tags
    #[schema(example = "election,2024")]
    pub tags: Option<String>,
    /// JSON object with `description`, `author` and `tags` overrides
    #[schema(example = r#"{"author": "Board of Elections"}"#)]
    pub metadata: Option<String>,
}

/// Outcome of an upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadOutcomeDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Placeholder link; the bytes are served only through the download endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "#download-0190c1a2-7b3e-7c4d-9e5f-0a1b2c3d4e5f")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcomeDto {
    pub fn uploaded(file_id: &str) -> Self {
        Self {
            success: true,
            file_id: Some(file_id.to_string()),
            download_url: Some(format!("{}{}", DOWNLOAD_PLACEHOLDER_PREFIX, file_id)),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_id: None,
            download_url: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a download request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadOutcomeDto {
    pub success: bool,
    /// Transient URL, valid until the download grace period ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadOutcomeDto {
    pub fn ready(url: String) -> Self {
        Self {
            success: true,
            download_url: Some(url),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_url: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate counters over every stored document
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FileStatsDto {
    pub total_files: u64,
    pub total_downloads: u64,
    pub files_by_category: BTreeMap<String, u64>,
}

impl FileStatsDto {
    pub fn from_metadata<'a>(records: impl IntoIterator<Item = &'a FileMetadata>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut stats, record| {
                stats.total_files += 1;
                stats.total_downloads += record.download_count;
                *stats
                    .files_by_category
                    .entry(record.category.clone())
                    .or_insert(0) += 1;
                stats
            })
    }
}

/// Caller-supplied values applied on top of the computed metadata at upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetadataOverrides {
    pub description: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl MetadataOverrides {
    /// Parse a JSON overrides object, refusing computed and unknown keys
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        check_keys(as_object(value)?, OVERRIDE_FIELDS)?;
        serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::InvalidMetadata(e.to_string()))
    }

    /// Fields set in `other` replace ours
    pub fn merge(self, other: MetadataOverrides) -> Self {
        Self {
            description: other.description.or(self.description),
            author: other.author.or(self.author),
            tags: other.tags.or(self.tags),
        }
    }
}

/// Request DTO for editing document metadata
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMetadataDto {
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub author: Option<String>,

    #[validate(length(max = 32))]
    pub tags: Option<Vec<String>>,

    #[validate(regex(path = *CATEGORY_REGEX, message = "subcategory must be a lowercase slug"))]
    pub subcategory: Option<String>,
}

impl UpdateMetadataDto {
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        check_keys(as_object(value)?, EDITABLE_FIELDS)?;
        serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::InvalidMetadata(e.to_string()))
    }

    pub fn into_patch(self) -> MetadataPatch {
        MetadataPatch {
            description: self.description,
            author: self.author,
            tags: self.tags,
            subcategory: self.subcategory,
        }
    }
}

/// Query params for listing documents
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListDocumentsQuery {
    /// Only documents in this category, newest first
    pub category: Option<String>,
}

/// Storage usage and lifecycle of the configured stores
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StorageUsageDto {
    pub used_bytes: u64,
    /// Zero when the engine does not report a ceiling
    pub quota_bytes: u64,
    pub primary_state: StoreState,
    pub fallback_state: Option<StoreState>,
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteDocumentResponseDto {
    pub deleted: bool,
}

/// Get file extension from content type
pub fn get_extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "text/plain" => Some("txt"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_accept_known_fields() {
        let overrides = MetadataOverrides::from_json(&json!({
            "description": "Adopted 1998",
            "tags": ["charter", "founding"]
        }))
        .unwrap();

        assert_eq!(overrides.description.as_deref(), Some("Adopted 1998"));
        assert_eq!(overrides.author, None);
        assert_eq!(overrides.tags.unwrap(), vec!["charter", "founding"]);
    }

    #[test]
    fn test_overrides_reject_computed_fields() {
        for key in ["id", "size", "downloadCount", "upload_date", "storedName"] {
            let err = MetadataOverrides::from_json(&json!({ key: "x" })).unwrap_err();
            assert_eq!(err, ValidationError::ComputedField(key.to_string()));
        }
    }

    #[test]
    fn test_overrides_reject_unknown_fields() {
        let err = MetadataOverrides::from_json(&json!({ "color": "red" })).unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("color".to_string()));
    }

    #[test]
    fn test_overrides_require_object() {
        let err = MetadataOverrides::from_json(&json!(["author"])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMetadata(_)));
    }

    #[test]
    fn test_overrides_merge_prefers_other() {
        let form = MetadataOverrides {
            description: Some("from form".into()),
            author: Some("Clerk".into()),
            tags: None,
        };
        let json = MetadataOverrides {
            description: Some("from json".into()),
            author: None,
            tags: Some(vec!["a".into()]),
        };

        let merged = form.merge(json);
        assert_eq!(merged.description.as_deref(), Some("from json"));
        assert_eq!(merged.author.as_deref(), Some("Clerk"));
        assert_eq!(merged.tags, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_update_dto_allows_subcategory() {
        let dto = UpdateMetadataDto::from_json(&json!({ "subcategory": "county" })).unwrap();
        assert!(dto.validate().is_ok());
        assert_eq!(dto.into_patch().subcategory.as_deref(), Some("county"));
    }

    #[test]
    fn test_update_dto_validation() {
        let dto = UpdateMetadataDto::from_json(&json!({ "subcategory": "Not A Slug" })).unwrap();
        assert!(dto.validate().is_err());

        let err = UpdateMetadataDto::from_json(&json!({ "is_public": false })).unwrap_err();
        assert_eq!(err, ValidationError::ComputedField("is_public".to_string()));
    }

    #[test]
    fn test_upload_outcome_placeholder_url() {
        let outcome = UploadOutcomeDto::uploaded("abc");
        assert!(outcome.success);
        assert_eq!(outcome.download_url.as_deref(), Some("#download-abc"));

        let value = serde_json::to_value(UploadOutcomeDto::failed("nope")).unwrap();
        assert_eq!(value, json!({ "success": false, "error": "nope" }));
    }
}
