use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::modules::storage::{StoreError, ValidationError};
use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Store(StoreError::ValidationFailed(err))
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(err) => match err {
                StoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::ValidationFailed(ValidationError::TooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                StoreError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::QuotaExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
                StoreError::DataCorruption { .. }
                | StoreError::MaterializationFailed(_)
                | StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Status, client-facing message and field errors. Server-side failures are
    /// logged here and replaced by a generic message.
    pub fn into_parts(self) -> (StatusCode, String, Option<Vec<String>>) {
        let status = self.status_code();
        match self {
            AppError::Store(StoreError::Database(ref e)) => {
                tracing::error!("Database error: {:?}", e);
                (status, "Database error occurred".to_string(), None)
            }
            AppError::Store(ref e @ StoreError::DataCorruption { .. }) => {
                tracing::error!("{}", e);
                (status, "Stored document is corrupted".to_string(), None)
            }
            AppError::Store(StoreError::MaterializationFailed(ref msg)) => {
                tracing::error!("Download materialization failed: {}", msg);
                (status, "Failed to prepare download".to_string(), None)
            }
            AppError::Store(ref e @ StoreError::StorageUnavailable(_)) => {
                tracing::warn!("{}", e);
                (status, e.to_string(), None)
            }
            AppError::Store(StoreError::ValidationFailed(ref e)) => {
                (status, e.to_string(), Some(vec![e.to_string()]))
            }
            AppError::Store(ref e) => (status, e.to_string(), None),
            AppError::Validation(msg) => (status, msg.clone(), Some(vec![msg])),
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => (status, msg, None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = self.into_parts();

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
