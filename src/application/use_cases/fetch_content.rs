use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::application::blob_store::{get_or_fail_in, BlobStore};
use crate::application::errors::ContentUseCaseError;
use crate::application::ports::StoreSession;
use crate::domain::digest::digest;
use crate::domain::entities::OwnedContent;
use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey, OwnerKind};

/// Cache validators of an owner's content, resolved without loading bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub tag: ContentTag,
    pub media_type: MediaType,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContentBody {
    pub digest: ContentDigest,
    pub data: Bytes,
}

/// Content served for avatars of users that have none. The tag is computed
/// once, when the content is loaded.
#[derive(Debug, Clone)]
pub struct DefaultContent {
    data: Bytes,
    digest: ContentDigest,
}

impl DefaultContent {
    pub fn new(data: Bytes, media_type: MediaType, last_modified: DateTime<Utc>) -> Self {
        let digest = ContentDigest {
            tag: digest(&data),
            media_type,
            last_modified,
        };
        Self { data, digest }
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Validators for an owner whose row is `row`, if any. A cleared row
    /// that changed after the default did moves `Last-Modified` forward.
    fn digest_for(&self, row: Option<&OwnedContent>) -> ContentDigest {
        let mut digest = self.digest.clone();
        if let Some(row) = row {
            digest.last_modified = digest.last_modified.max(row.updated_at());
        }
        digest
    }
}

/// Use case: read an owner's content for the cache boundary
pub struct FetchContentUseCase {
    store: Arc<BlobStore>,
    default_avatar: Option<Arc<DefaultContent>>,
}

impl FetchContentUseCase {
    pub fn new(store: Arc<BlobStore>) -> Self {
        Self {
            store,
            default_avatar: None,
        }
    }

    /// Serve `content` for avatars that are missing or cleared instead of
    /// reporting them as not found.
    pub fn with_default_avatar(mut self, content: DefaultContent) -> Self {
        self.default_avatar = Some(Arc::new(content));
        self
    }

    /// Tag, media type and last-modified time of `owner`'s content.
    pub async fn digest(
        &self,
        owner: OwnerKey,
        group_id: i64,
    ) -> Result<ContentDigest, ContentUseCaseError> {
        let fallback = self.fallback_for(owner);
        self.store
            .run_in_session("content_digest", move |session| {
                let fallback = fallback.clone();
                Box::pin(async move {
                    let row = load_owned(session, owner, group_id).await?;
                    match (row, fallback) {
                        (Some(row), _) if row.has_content() => content_digest(&row, owner),
                        (row, Some(fallback)) => Ok(fallback.digest_for(row.as_ref())),
                        _ => Err(ContentUseCaseError::NotFound(owner.to_string())),
                    }
                })
            })
            .await
    }

    /// Owner row and blob read together, so the returned tag always belongs
    /// to the returned bytes.
    pub async fn read(
        &self,
        owner: OwnerKey,
        group_id: i64,
    ) -> Result<ContentBody, ContentUseCaseError> {
        let fallback = self.fallback_for(owner);
        self.store
            .run_in_session("content_read", move |session| {
                let fallback = fallback.clone();
                Box::pin(async move {
                    let row = load_owned(session, owner, group_id).await?;
                    let content = match (row, fallback) {
                        (Some(row), _) if row.has_content() => row,
                        (row, Some(fallback)) => {
                            return Ok(ContentBody {
                                digest: fallback.digest_for(row.as_ref()),
                                data: fallback.data.clone(),
                            });
                        }
                        _ => return Err(ContentUseCaseError::NotFound(owner.to_string())),
                    };

                    let digest = content_digest(&content, owner)?;
                    let data =
                        get_or_fail_in(session, &digest.tag, &format!("content of {}", owner))
                            .await?;
                    Ok::<_, ContentUseCaseError>(ContentBody { digest, data })
                })
            })
            .await
    }

    fn fallback_for(&self, owner: OwnerKey) -> Option<Arc<DefaultContent>> {
        match owner.kind {
            OwnerKind::UserAvatar => self.default_avatar.clone(),
            _ => None,
        }
    }
}

/// The owner's row, read without a row lock. A row of another group is
/// reported as not found.
async fn load_owned(
    session: &mut dyn StoreSession,
    owner: OwnerKey,
    group_id: i64,
) -> Result<Option<OwnedContent>, ContentUseCaseError> {
    match session.read_content(&owner).await? {
        Some(content) if content.group_id() != group_id => {
            Err(ContentUseCaseError::NotFound(owner.to_string()))
        }
        row => Ok(row),
    }
}

fn content_digest(
    content: &OwnedContent,
    owner: OwnerKey,
) -> Result<ContentDigest, ContentUseCaseError> {
    match (content.tag(), content.media_type()) {
        (Some(tag), Some(media_type)) => Ok(ContentDigest {
            tag: tag.clone(),
            media_type: media_type.clone(),
            last_modified: content.updated_at(),
        }),
        _ => Err(ContentUseCaseError::NotFound(owner.to_string())),
    }
}
