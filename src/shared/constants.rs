/// MIME type accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_MIME_TYPE: &str = "application/pdf";

/// Size ceiling used when the caller does not pass one (100MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Prefix of the placeholder URL returned by uploads; bytes are only served by an explicit download
pub const DOWNLOAD_PLACEHOLDER_PREFIX: &str = "#download-";

/// Extension used when neither the MIME type nor the filename gives one
pub const FALLBACK_EXTENSION: &str = "bin";
