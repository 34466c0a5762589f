use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware::from_fn,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;

use crate::core::config::DownloadConfig;
use crate::core::middleware;
use crate::features::documents::handlers;
use crate::features::documents::services::DocumentService;

/// Multipart framing and the text fields around the file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Public routes: listing, statistics and downloads
pub fn routes(service: Arc<DocumentService>) -> Router {
    Router::new()
        .route("/api/documents", get(handlers::list_documents))
        .route("/api/documents/stats", get(handlers::get_document_stats))
        .route("/api/documents/storage", get(handlers::get_storage_usage))
        .route("/api/documents/{id}", get(handlers::get_document))
        .route(
            "/api/documents/{id}/download",
            post(handlers::download_document),
        )
        .with_state(service)
}

/// Admin routes, relative to `/api/admin`
pub fn admin_routes(service: Arc<DocumentService>) -> Router {
    let upload_limit = usize::try_from(service.max_upload_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/documents/upload",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/documents/{id}",
            patch(handlers::update_document).delete(handlers::delete_document),
        )
        .route("/documents", delete(handlers::clear_documents))
        .with_state(service)
}

/// Materialized downloads under the configured prefix, always sent as attachments
pub fn downloads_router(config: &DownloadConfig) -> Router {
    let files = SetResponseHeader::overriding(
        ServeDir::new(&config.dir),
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment"),
    );
    Router::new().nest_service(&config.url_prefix, files)
}

/// Public and admin routes together; admin routes require basic auth when
/// credentials are configured
pub fn router(service: Arc<DocumentService>, admin_credentials: Option<String>) -> Router {
    let admin = match admin_credentials {
        Some(credentials) => {
            tracing::info!("Document admin basic auth enabled");
            admin_routes(Arc::clone(&service)).route_layer(from_fn(
                middleware::basic_auth_middleware(Arc::new(credentials)),
            ))
        }
        None => {
            tracing::warn!("Document admin basic auth disabled (no credentials configured)");
            admin_routes(Arc::clone(&service))
        }
    };

    Router::new()
        .merge(routes(service))
        .nest("/api/admin", admin)
}
