use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::errors::ContentUseCaseError;
use crate::application::ownership::ContentChange;
use crate::application::use_cases::PostDataItem;
use crate::domain::value_objects::{ContentTag, MediaType};

/// One entry of a post data list as sent over JSON
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PostDataItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
    /// Standard base64 of the raw bytes
    #[validate(length(min = 1))]
    pub data: String,
}

impl PostDataItemRequest {
    /// Decode the item; decoded data longer than `max_bytes` is rejected.
    pub fn decode(&self, max_bytes: usize) -> Result<PostDataItem, ContentUseCaseError> {
        let media_type = MediaType::parse(&self.content_type)?;
        let data = STANDARD.decode(self.data.trim()).map_err(|e| {
            ContentUseCaseError::InvalidRequest(format!("data is not valid base64: {}", e))
        })?;
        if data.len() > max_bytes {
            return Err(ContentUseCaseError::TooLarge {
                size: data.len(),
                limit: max_bytes,
            });
        }

        Ok(PostDataItem {
            data: Bytes::from(data),
            media_type,
        })
    }
}

/// Request body for replacing a post's data list
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReplacePostDataRequest {
    #[validate(length(min = 1, max = 100), nested)]
    pub data_list: Vec<PostDataItemRequest>,
}

impl ReplacePostDataRequest {
    pub fn decode(&self, max_bytes: usize) -> Result<Vec<PostDataItem>, ContentUseCaseError> {
        self.data_list
            .iter()
            .map(|item| item.decode(max_bytes))
            .collect()
    }
}

/// Tag assigned to an owner after a write
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentTagResponse {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<String>,
}

impl From<ContentChange> for ContentTagResponse {
    fn from(change: ContentChange) -> Self {
        Self {
            tag: change.tag.map(String::from).unwrap_or_default(),
            replaced: change.previous.map(String::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDataResponse {
    pub post_id: i64,
    pub tags: Vec<String>,
}

impl PostDataResponse {
    pub fn new(post_id: i64, tags: Vec<ContentTag>) -> Self {
        Self {
            post_id,
            tags: tags.into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetachedResponse {
    pub detached: usize,
}
