use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::shared::constants::{DEFAULT_ALLOWED_MIME_TYPE, DEFAULT_MAX_FILE_SIZE};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    /// Optional second store consulted when the primary cannot be opened
    pub fallback_store: Option<StoreConfig>,
    pub upload: UploadConfig,
    pub download: DownloadConfig,
    pub admin: AdminConfig,
    pub openapi: OpenApiConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// SQLite document store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// sqlx connection URL, e.g. `sqlite://data/documents.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_secs: u64,
    /// Hard page limit applied through `PRAGMA max_page_count`
    pub max_page_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub allowed_mime_types: Vec<String>,
    /// Ceiling for categories without an explicit limit
    pub max_file_size: u64,
    pub category_max_sizes: HashMap<String, u64>,
}

/// Where materialized downloads are written and how long they live
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub dir: PathBuf,
    pub url_prefix: String,
    pub grace_period: Duration,
}

/// Basic-auth credentials protecting upload, edit and delete routes
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let store = StoreConfig::from_env()?;
        let fallback_store = env::var("FALLBACK_STORE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|url| StoreConfig {
                url,
                ..store.clone()
            });

        Ok(Config {
            app: AppConfig::from_env()?,
            store,
            fallback_store,
            upload: UploadConfig::from_env()?,
            download: DownloadConfig::from_env()?,
            admin: AdminConfig::from_env(),
            openapi: OpenApiConfig::from_env(),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let cors_allowed_origins = parse_list(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StoreConfig {
    const DEFAULT_URL: &'static str = "sqlite://data/documents.db";
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DOCUMENT_STORE_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_string());

        let max_connections = env::var("STORE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "STORE_MAX_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("STORE_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "STORE_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let busy_timeout_secs = env::var("STORE_BUSY_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_BUSY_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "STORE_BUSY_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_page_count = match env::var("STORE_MAX_PAGE_COUNT") {
            Ok(value) if !value.is_empty() => Some(
                value
                    .parse::<u32>()
                    .map_err(|_| "STORE_MAX_PAGE_COUNT must be a valid number".to_string())?,
            ),
            _ => None,
        };

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            busy_timeout_secs,
            max_page_count,
        })
    }

    /// Defaults for everything but the URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            busy_timeout_secs: Self::DEFAULT_BUSY_TIMEOUT_SECS,
            max_page_count: None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Filesystem path of the database file, if the URL names one
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.is_in_memory() {
            return None;
        }
        let rest = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, String> {
        let allowed_mime_types = parse_list(
            &env::var("UPLOAD_ALLOWED_MIME_TYPES")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_MIME_TYPE.to_string()),
        );

        let max_file_size = env::var("UPLOAD_MAX_FILE_SIZE")
            .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE.to_string())
            .parse::<u64>()
            .map_err(|_| "UPLOAD_MAX_FILE_SIZE must be a valid number".to_string())?;

        let category_max_sizes =
            parse_category_limits(&env::var("UPLOAD_CATEGORY_LIMITS").unwrap_or_default())?;

        Ok(Self {
            allowed_mime_types,
            max_file_size,
            category_max_sizes,
        })
    }

    /// Size ceiling for `category`, falling back to the global maximum
    pub fn max_size_for(&self, category: &str) -> u64 {
        self.category_max_sizes
            .get(category)
            .copied()
            .unwrap_or(self.max_file_size)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: vec![DEFAULT_ALLOWED_MIME_TYPE.to_string()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            category_max_sizes: HashMap::new(),
        }
    }
}

impl DownloadConfig {
    const DEFAULT_URL_PREFIX: &'static str = "/downloads";
    const DEFAULT_GRACE_PERIOD_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let dir = env::var("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("civic-docs-downloads"));

        let url_prefix = env::var("DOWNLOAD_URL_PREFIX")
            .unwrap_or_else(|_| Self::DEFAULT_URL_PREFIX.to_string())
            .trim_end_matches('/')
            .to_string();

        let grace_period_secs = env::var("DOWNLOAD_GRACE_PERIOD_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_GRACE_PERIOD_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DOWNLOAD_GRACE_PERIOD_SECS must be a valid number".to_string())?;

        Ok(Self {
            dir,
            url_prefix,
            grace_period: Duration::from_secs(grace_period_secs),
        })
    }
}

impl AdminConfig {
    pub fn from_env() -> Self {
        // Only use credentials if they are non-empty
        let username = env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());
        Self { username, password }
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl OpenApiConfig {
    pub fn from_env() -> Self {
        let title =
            env::var("OPENAPI_TITLE").unwrap_or_else(|_| "Civic Documents API".to_string());
        let version = env::var("OPENAPI_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("OPENAPI_DESCRIPTION")
            .unwrap_or_else(|_| "Document library for constitutions, voter guides and research papers".to_string());

        Self {
            title,
            version,
            description,
        }
    }
}

/// Split a comma-separated value, dropping blanks
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `category=bytes` pairs, e.g. `constitution=10485760,voter-guide=20971520`
fn parse_category_limits(value: &str) -> Result<HashMap<String, u64>, String> {
    parse_list(value)
        .into_iter()
        .map(|pair| {
            let (category, limit) = pair
                .split_once('=')
                .ok_or_else(|| format!("UPLOAD_CATEGORY_LIMITS entry '{}' must be category=bytes", pair))?;
            let limit = limit.trim().parse::<u64>().map_err(|_| {
                format!("UPLOAD_CATEGORY_LIMITS entry '{}' has an invalid size", pair)
            })?;
            Ok((category.trim().to_string(), limit))
        })
        .collect()
}
