//! Error types shared by the blob store and the owner use cases

use thiserror::Error;

use crate::application::ports::{ContentRejected, RepositoryError};
use crate::domain::errors::DomainError;

/// Errors surfaced by [`BlobStore`](crate::application::blob_store::BlobStore)
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An owner holds a tag whose entry is missing, or an entry was about to
    /// be removed while still referenced. Never user-correctable.
    #[error("Data integrity fault for tag {tag}: {context}")]
    DataIntegrityFault { tag: String, context: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl BlobStoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BlobStoreError::Repository(e) if e.is_retryable())
    }
}

impl From<DomainError> for BlobStoreError {
    fn from(err: DomainError) -> Self {
        BlobStoreError::InvalidArgument(err.to_string())
    }
}

/// Common error type for the owner use cases (avatar, post data, fetch)
#[derive(Debug, Error)]
pub enum ContentUseCaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Content rejected: {0}")]
    Rejected(#[from] ContentRejected),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] BlobStoreError),
}

impl From<RepositoryError> for ContentUseCaseError {
    fn from(err: RepositoryError) -> Self {
        ContentUseCaseError::Store(BlobStoreError::Repository(err))
    }
}
