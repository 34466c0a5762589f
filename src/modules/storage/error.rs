use thiserror::Error;

/// Reasons an incoming file or metadata edit is refused before it reaches the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File type '{mime_type}' is not allowed. Allowed types: {allowed}")]
    UnsupportedMimeType { mime_type: String, allowed: String },

    #[error("File too large: {size} bytes exceeds the maximum of {max_size} bytes")]
    TooLarge { size: u64, max_size: u64 },

    #[error("File is empty")]
    EmptyFile,

    #[error("Declared size {declared} bytes does not match the {actual} byte payload")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("Invalid category '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidCategory(String),

    #[error("Field '{0}' is computed by the store and cannot be overridden")]
    ComputedField(String),

    #[error("Unknown metadata field '{0}'")]
    UnknownField(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

/// Error taxonomy of the document object store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Data corruption for file {id}: {reason}")]
    DataCorruption { id: String, reason: String },

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Failed to materialize download: {0}")]
    MaterializationFailed(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

/// SQLITE_FULL primary result code
const SQLITE_FULL: &str = "13";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(SQLITE_FULL)
                || db_err.message().contains("database or disk is full")
            {
                return StoreError::QuotaExceeded(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
