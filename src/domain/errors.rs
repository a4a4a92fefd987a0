use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid content tag: expected {expected}, got {actual}")]
    InvalidTag { expected: String, actual: String },

    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("Invalid owner kind: {0}")]
    InvalidOwnerKind(String),

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),
}
