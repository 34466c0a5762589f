use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::documents::{dtos as documents_dtos, handlers as documents_handlers};
use crate::modules::storage::{Backend, StoreState};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Documents (public)
        documents_handlers::list_documents,
        documents_handlers::get_document,
        documents_handlers::get_document_stats,
        documents_handlers::get_storage_usage,
        documents_handlers::download_document,
        // Documents (admin)
        documents_handlers::upload_document,
        documents_handlers::update_document,
        documents_handlers::delete_document,
        documents_handlers::clear_documents,
    ),
    components(
        schemas(
            ApiResponse<documents_dtos::FileMetadataDto>,
            ApiResponse<Vec<documents_dtos::FileMetadataDto>>,
            ApiResponse<documents_dtos::FileStatsDto>,
            ApiResponse<documents_dtos::StorageUsageDto>,
            ApiResponse<documents_dtos::DeleteDocumentResponseDto>,
            Meta,
            documents_dtos::FileMetadataDto,
            documents_dtos::UploadDocumentDto,
            documents_dtos::UploadOutcomeDto,
            documents_dtos::DownloadOutcomeDto,
            documents_dtos::FileStatsDto,
            documents_dtos::UpdateMetadataDto,
            documents_dtos::StorageUsageDto,
            documents_dtos::DeleteDocumentResponseDto,
            StoreState,
            Backend,
        )
    ),
    tags(
        (name = "documents", description = "Civic document library: uploads, downloads and listings")
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Civic Documents API",
        version = "0.1.0",
        description = "API documentation for the civic document library",
    )
)]
pub struct ApiDoc;

/// Adds HTTP basic auth security scheme for the admin routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct OpenApiInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for OpenApiInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
