use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive part of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    /// `{category}_{unixMillis}.{ext}`
    pub stored_name: String,
    pub original_name: String,
    /// `{category}/{stored_name}`, kept for remote-storage compatibility
    pub storage_path: String,
    pub size: u64,
    pub mime_type: String,
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

/// A document together with its bytes.
///
/// The payload is owned by the record; readers receive their own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub metadata: FileMetadata,
    pub payload: Vec<u8>,
}

impl FileRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Caller-editable fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub description: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub subcategory: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.author.is_none()
            && self.tags.is_none()
            && self.subcategory.is_none()
    }
}

/// Best-effort view of the storage engine's capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageEstimate {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

/// ISO-8601 UTC with fixed nanosecond width: lossless, and text ordering matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}
