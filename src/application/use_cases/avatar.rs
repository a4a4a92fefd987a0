use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::application::blob_store::BlobStore;
use crate::application::errors::ContentUseCaseError;
use crate::application::ownership::{ContentChange, ContentLifecycle};
use crate::application::ports::{ContentRejected, ContentValidator};
use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey};

/// Use case: set and remove a user's avatar
pub struct AvatarUseCase {
    store: Arc<BlobStore>,
    validator: Arc<dyn ContentValidator>,
}

impl AvatarUseCase {
    pub fn new(store: Arc<BlobStore>, validator: Arc<dyn ContentValidator>) -> Self {
        Self { store, validator }
    }

    /// Create or replace the avatar. Only image types are accepted.
    pub async fn set(
        &self,
        user_id: i64,
        data: Bytes,
        declared: &MediaType,
    ) -> Result<ContentChange, ContentUseCaseError> {
        if !declared.is_image() {
            return Err(ContentRejected::UnsupportedType(declared.to_string()).into());
        }
        let media_type = self.validator.validate(&data, declared)?;
        let owner = OwnerKey::avatar(user_id);

        let change = self
            .store
            .run_in_session("set_avatar", move |session| {
                let data = data.clone();
                let media_type = media_type.clone();
                Box::pin(async move {
                    let change = ContentLifecycle::set_content(
                        session,
                        owner,
                        user_id,
                        &data,
                        media_type,
                        Utc::now(),
                    )
                    .await?;
                    Ok::<_, ContentUseCaseError>(change)
                })
            })
            .await?;

        info!(user_id, tag = ?change.tag, "avatar_set");
        Ok(change)
    }

    /// Remove the avatar and release its content.
    pub async fn delete(&self, user_id: i64) -> Result<ContentTag, ContentUseCaseError> {
        let owner = OwnerKey::avatar(user_id);

        let freed = self
            .store
            .run_in_session("delete_avatar", move |session| {
                Box::pin(async move {
                    let freed = ContentLifecycle::detach(session, owner, Utc::now()).await?;
                    Ok::<_, ContentUseCaseError>(freed)
                })
            })
            .await?;

        match freed {
            Some(tag) => {
                info!(user_id, tag = %tag, "avatar_deleted");
                Ok(tag)
            }
            None => Err(ContentUseCaseError::NotFound(format!(
                "user {} has no avatar",
                user_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockContentValidator;
    use crate::domain::digest::digest;
    use crate::infrastructure::persistence::MemoryStore;

    fn png() -> MediaType {
        MediaType::parse("image/png").unwrap()
    }

    fn setup(validator: MockContentValidator) -> (AvatarUseCase, MemoryStore) {
        let memory = MemoryStore::new();
        let store = Arc::new(BlobStore::new(Arc::new(memory.clone())));
        (AvatarUseCase::new(store, Arc::new(validator)), memory)
    }

    fn accepting() -> MockContentValidator {
        let mut validator = MockContentValidator::new();
        validator
            .expect_validate()
            .returning(|_, declared| Ok(declared.clone()));
        validator
    }

    #[tokio::test]
    async fn test_replace_avatar_frees_old_content() {
        let (use_case, memory) = setup(accepting());

        use_case
            .set(1, Bytes::from_static(b"old"), &png())
            .await
            .unwrap();
        let change = use_case
            .set(1, Bytes::from_static(b"new"), &png())
            .await
            .unwrap();

        assert_eq!(change.previous, Some(digest(b"old")));
        assert_eq!(memory.ref_count(&digest(b"old")).await, None);
        assert_eq!(memory.ref_count(&digest(b"new")).await, Some(1));
    }

    #[tokio::test]
    async fn test_text_avatar_is_rejected_before_validation() {
        let mut validator = MockContentValidator::new();
        validator.expect_validate().times(0);
        let (use_case, memory) = setup(validator);

        let err = use_case
            .set(1, Bytes::from_static(b"hi"), &MediaType::parse("text/plain").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ContentUseCaseError::Rejected(ContentRejected::UnsupportedType(_))
        ));
        assert_eq!(memory.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_validator_rejection_stores_nothing() {
        let mut validator = MockContentValidator::new();
        validator.expect_validate().times(1).returning(|_, declared| {
            Err(ContentRejected::Malformed {
                media_type: declared.to_string(),
                reason: "truncated".to_string(),
            })
        });
        let (use_case, memory) = setup(validator);

        assert!(use_case
            .set(1, Bytes::from_static(b"\x89P"), &png())
            .await
            .is_err());
        assert_eq!(memory.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_avatar_is_not_found() {
        let (use_case, _) = setup(accepting());
        assert!(matches!(
            use_case.delete(42).await,
            Err(ContentUseCaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_avatar_releases_reference() {
        let (use_case, memory) = setup(accepting());
        use_case
            .set(7, Bytes::from_static(b"face"), &png())
            .await
            .unwrap();

        assert_eq!(use_case.delete(7).await.unwrap(), digest(b"face"));
        assert_eq!(memory.entry_count().await, 0);
        assert!(!memory
            .content(&OwnerKey::avatar(7))
            .await
            .unwrap()
            .has_content());
    }
}
