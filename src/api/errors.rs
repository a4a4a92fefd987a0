use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::api::cache::CacheHeaderError;
use crate::application::errors::{BlobStoreError, ContentUseCaseError};
use crate::application::ports::ContentRejected;
use crate::domain::errors::DomainError;

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::InvalidArgument(msg) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_argument", msg)
            }
            BlobStoreError::DataIntegrityFault { tag, context } => {
                error!(tag = %tag, context = %context, "data_integrity_fault");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "data_integrity_fault",
                    "Stored content is inconsistent",
                )
            }
            BlobStoreError::Repository(e) if e.is_retryable() => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "conflict",
                "Too many concurrent updates, retry later",
            ),
            BlobStoreError::Repository(e) => {
                error!(error = %e, "repository_error");
                ApiError::internal_error("Repository error")
            }
        }
    }
}

impl From<ContentRejected> for ApiError {
    fn from(err: ContentRejected) -> Self {
        match err {
            ContentRejected::UnsupportedType(_) => ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                err.to_string(),
            ),
            ContentRejected::Malformed { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "content_rejected", err.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "invalid_argument", err.to_string())
    }
}

impl From<ContentUseCaseError> for ApiError {
    fn from(err: ContentUseCaseError) -> Self {
        match err {
            ContentUseCaseError::NotFound(msg) => ApiError::not_found(msg),
            ContentUseCaseError::Rejected(e) => e.into(),
            ContentUseCaseError::InvalidRequest(msg) => ApiError::bad_request(msg),
            ContentUseCaseError::TooLarge { .. } => ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                err.to_string(),
            ),
            ContentUseCaseError::Domain(e) => e.into(),
            ContentUseCaseError::Store(e) => e.into(),
        }
    }
}

impl From<CacheHeaderError> for ApiError {
    fn from(err: CacheHeaderError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    }
}
