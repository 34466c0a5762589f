use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::documents::dtos::{
    DeleteDocumentResponseDto, DownloadOutcomeDto, FileMetadataDto, FileStatsDto,
    ListDocumentsQuery, MetadataOverrides, StorageUsageDto, UpdateMetadataDto,
    UploadDocumentDto, UploadOutcomeDto,
};
use crate::features::documents::services::{DocumentService, IncomingFile, UploadRequest};
use crate::shared::types::{ApiResponse, Meta};

fn multipart_error(e: MultipartError) -> AppError {
    debug!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    }
}

/// Collect the upload form. Form fields come first; a `metadata` JSON object
/// overrides them.
async fn read_upload_form(mut multipart: Multipart) -> Result<(IncomingFile, UploadRequest)> {
    let mut file: Option<IncomingFile> = None;
    let mut category: Option<String> = None;
    let mut subcategory: Option<String> = None;
    let mut fields = MetadataOverrides::default();
    let mut json_overrides: Option<MetadataOverrides> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let mime_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let original_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unnamed".to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;

                file = Some(IncomingFile {
                    original_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            "category" => {
                category = Some(field.text().await.map_err(multipart_error)?.trim().to_string());
            }
            "subcategory" => {
                subcategory = Some(field.text().await.map_err(multipart_error)?);
            }
            "description" => {
                fields.description = Some(field.text().await.map_err(multipart_error)?);
            }
            "author" => {
                fields.author = Some(field.text().await.map_err(multipart_error)?);
            }
            "tags" => {
                let text = field.text().await.map_err(multipart_error)?;
                fields.tags = Some(
                    text.split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect(),
                );
            }
            "metadata" => {
                let text = field.text().await.map_err(multipart_error)?;
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("Invalid metadata JSON: {}", e)))?;
                json_overrides = Some(MetadataOverrides::from_json(&value)?);
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let category = category
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Category is required".to_string()))?;

    let overrides = match json_overrides {
        Some(json) => fields.merge(json),
        None => fields,
    };

    Ok((
        file,
        UploadRequest {
            category,
            subcategory,
            overrides,
        },
    ))
}

/// Upload a document
///
/// Accepts multipart/form-data with a `file` and a `category`, plus optional
/// `subcategory`, `description`, `author`, comma separated `tags` and a
/// `metadata` JSON object of overrides.
#[utoipa::path(
    post,
    path = "/api/admin/documents/upload",
    tag = "documents",
    request_body(
        content = UploadDocumentDto,
        content_type = "multipart/form-data",
        description = "Document upload form",
    ),
    responses(
        (status = 201, description = "Document uploaded", body = UploadOutcomeDto),
        (status = 400, description = "Invalid file, category or metadata", body = UploadOutcomeDto),
        (status = 401, description = "Admin credentials required"),
        (status = 413, description = "File too large", body = UploadOutcomeDto),
        (status = 503, description = "Storage unavailable", body = UploadOutcomeDto),
        (status = 507, description = "Storage quota exceeded", body = UploadOutcomeDto)
    ),
    security(
        ("basic_auth" = [])
    )
)]
pub async fn upload_document(
    State(service): State<Arc<DocumentService>>,
    multipart: Multipart,
) -> (StatusCode, Json<UploadOutcomeDto>) {
    let result = match read_upload_form(multipart).await {
        Ok((file, request)) => service.upload_file(file, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(metadata) => (
            StatusCode::CREATED,
            Json(UploadOutcomeDto::uploaded(&metadata.id)),
        ),
        Err(e) => {
            let (status, message, _) = e.into_parts();
            (status, Json(UploadOutcomeDto::failed(message)))
        }
    }
}

/// Download a document
///
/// Counts the download and returns a transient URL for the bytes.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/download",
    tag = "documents",
    params(
        ("id" = String, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Download ready", body = DownloadOutcomeDto),
        (status = 404, description = "Document not found", body = DownloadOutcomeDto),
        (status = 500, description = "Stored document is corrupted", body = DownloadOutcomeDto),
        (status = 503, description = "Storage unavailable", body = DownloadOutcomeDto)
    )
)]
pub async fn download_document(
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<DownloadOutcomeDto>) {
    match service.download_file(&id).await {
        Ok(download) => (StatusCode::OK, Json(DownloadOutcomeDto::ready(download.url))),
        Err(e) => {
            let (status, message, _) = e.into_parts();
            (status, Json(DownloadOutcomeDto::failed(message)))
        }
    }
}

/// List documents, optionally for a single category
#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "documents",
    params(ListDocumentsQuery),
    responses(
        (status = 200, description = "Documents", body = ApiResponse<Vec<FileMetadataDto>>),
        (status = 400, description = "Invalid category")
    )
)]
pub async fn list_documents(
    State(service): State<Arc<DocumentService>>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<ApiResponse<Vec<FileMetadataDto>>>> {
    let files = match query.category.as_deref() {
        Some(category) => service.get_files_by_category(category).await?,
        None => service.list_files().await?,
    };
    let total = files.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(files),
        None,
        Some(Meta { total }),
    )))
}

/// Get document metadata
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "documents",
    params(
        ("id" = String, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document metadata", body = ApiResponse<FileMetadataDto>),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document(
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileMetadataDto>>> {
    let file = service.get_file(&id).await?;
    Ok(Json(ApiResponse::success(Some(file), None, None)))
}

/// Document counts and total downloads
#[utoipa::path(
    get,
    path = "/api/documents/stats",
    tag = "documents",
    responses(
        (status = 200, description = "Statistics", body = ApiResponse<FileStatsDto>)
    )
)]
pub async fn get_document_stats(
    State(service): State<Arc<DocumentService>>,
) -> Result<Json<ApiResponse<FileStatsDto>>> {
    let stats = service.get_file_stats().await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// Storage usage estimate and store lifecycle
#[utoipa::path(
    get,
    path = "/api/documents/storage",
    tag = "documents",
    responses(
        (status = 200, description = "Storage usage", body = ApiResponse<StorageUsageDto>)
    )
)]
pub async fn get_storage_usage(
    State(service): State<Arc<DocumentService>>,
) -> Json<ApiResponse<StorageUsageDto>> {
    let usage = service.storage_usage().await;
    Json(ApiResponse::success(Some(usage), None, None))
}

/// Edit document metadata
///
/// Only `description`, `author`, `tags` and `subcategory` can be changed.
#[utoipa::path(
    patch,
    path = "/api/admin/documents/{id}",
    tag = "documents",
    params(
        ("id" = String, Path, description = "Document ID")
    ),
    request_body = UpdateMetadataDto,
    responses(
        (status = 200, description = "Metadata updated", body = ApiResponse<FileMetadataDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Admin credentials required"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("basic_auth" = [])
    )
)]
pub async fn update_document(
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<ApiResponse<FileMetadataDto>>> {
    let dto = UpdateMetadataDto::from_json(&body)?;
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let file = service.update_metadata(&id, dto).await?;

    Ok(Json(ApiResponse::success(
        Some(file),
        Some("Document updated successfully".to_string()),
        None,
    )))
}

/// Delete a document
///
/// Deleting an unknown id succeeds.
#[utoipa::path(
    delete,
    path = "/api/admin/documents/{id}",
    tag = "documents",
    params(
        ("id" = String, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document deleted", body = ApiResponse<DeleteDocumentResponseDto>),
        (status = 401, description = "Admin credentials required")
    ),
    security(
        ("basic_auth" = [])
    )
)]
pub async fn delete_document(
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeleteDocumentResponseDto>>> {
    service.delete_file(&id).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteDocumentResponseDto { deleted: true }),
        Some("Document deleted successfully".to_string()),
        None,
    )))
}

/// Remove every document
#[utoipa::path(
    delete,
    path = "/api/admin/documents",
    tag = "documents",
    responses(
        (status = 200, description = "All documents removed", body = ApiResponse<DeleteDocumentResponseDto>),
        (status = 401, description = "Admin credentials required")
    ),
    security(
        ("basic_auth" = [])
    )
)]
pub async fn clear_documents(
    State(service): State<Arc<DocumentService>>,
) -> Result<Json<ApiResponse<DeleteDocumentResponseDto>>> {
    service.clear().await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteDocumentResponseDto { deleted: true }),
        Some("All documents removed".to_string()),
        None,
    )))
}
