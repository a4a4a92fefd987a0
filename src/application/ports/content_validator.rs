#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::MediaType;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentRejected {
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Content does not match {media_type}: {reason}")]
    Malformed { media_type: String, reason: String },
}

/// External format check run before any bytes reach the blob store.
///
/// Returns the format label the owner stores next to the tag.
#[cfg_attr(test, automock)]
pub trait ContentValidator: Send + Sync {
    fn validate(&self, data: &[u8], declared: &MediaType) -> Result<MediaType, ContentRejected>;
}
