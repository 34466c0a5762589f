mod document_service;
mod upload_gateway;

pub use document_service::DocumentService;
pub use upload_gateway::{IncomingFile, UploadGateway, UploadPolicy, UploadRequest};
