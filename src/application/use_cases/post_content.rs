use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::application::blob_store::BlobStore;
use crate::application::errors::ContentUseCaseError;
use crate::application::ownership::ContentLifecycle;
use crate::application::ports::{ContentScope, ContentValidator, StoreSession};
use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey, OwnerKind, MAX_POST_SLOTS};

/// One decoded entry of a post's data list
#[derive(Debug, Clone)]
pub struct PostDataItem {
    pub data: Bytes,
    pub media_type: MediaType,
}

/// Use case: manage the data list of timeline posts
pub struct PostContentUseCase {
    store: Arc<BlobStore>,
    validator: Arc<dyn ContentValidator>,
}

impl PostContentUseCase {
    pub fn new(store: Arc<BlobStore>, validator: Arc<dyn ContentValidator>) -> Self {
        Self { store, validator }
    }

    /// Replace the whole data list of a post.
    ///
    /// Slot `i` receives item `i`; slots beyond the new list are detached.
    /// Returns the tag of every item in order.
    pub async fn replace_data(
        &self,
        user_id: i64,
        post_id: i64,
        items: Vec<PostDataItem>,
    ) -> Result<Vec<ContentTag>, ContentUseCaseError> {
        if items.is_empty() || items.len() > MAX_POST_SLOTS as usize {
            return Err(ContentUseCaseError::InvalidRequest(format!(
                "data list must contain 1 to {} items, got {}",
                MAX_POST_SLOTS,
                items.len()
            )));
        }

        let mut slots = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let media_type = self.validator.validate(&item.data, &item.media_type)?;
            let owner = OwnerKey::post_data(post_id, index as i32)?;
            slots.push((owner, item.data, media_type));
        }

        let tags = self
            .store
            .run_in_session("replace_post_data", move |session| {
                let slots = slots.clone();
                Box::pin(async move {
                    ensure_post_owner(session, user_id, post_id).await?;

                    let now = Utc::now();
                    let mut tags = Vec::with_capacity(slots.len());
                    for (owner, data, media_type) in slots.iter() {
                        let change = ContentLifecycle::set_content(
                            session,
                            *owner,
                            user_id,
                            data,
                            media_type.clone(),
                            now,
                        )
                        .await?;
                        tags.extend(change.tag);
                    }

                    ContentLifecycle::truncate_slots(
                        session,
                        OwnerKind::PostData,
                        post_id,
                        slots.len() as i32,
                        now,
                    )
                    .await?;

                    Ok::<_, ContentUseCaseError>(tags)
                })
            })
            .await?;

        info!(user_id, post_id, items = tags.len(), "post_data_replaced");
        Ok(tags)
    }

    /// Soft-delete a post: every data slot is detached.
    pub async fn delete_post(
        &self,
        user_id: i64,
        post_id: i64,
    ) -> Result<usize, ContentUseCaseError> {
        let detached = self
            .store
            .run_in_session("delete_post", move |session| {
                Box::pin(async move {
                    ensure_post_owner(session, user_id, post_id).await?;
                    let detached = ContentLifecycle::detach_owner(
                        session,
                        OwnerKind::PostData,
                        post_id,
                        Utc::now(),
                    )
                    .await?;
                    Ok::<_, ContentUseCaseError>(detached)
                })
            })
            .await?;

        info!(user_id, post_id, detached, "post_deleted");
        Ok(detached)
    }

    /// Hard-delete every post of a user. Returns the number of data slots
    /// that held content.
    pub async fn delete_all_posts(&self, user_id: i64) -> Result<usize, ContentUseCaseError> {
        let detached = self
            .store
            .run_in_session("delete_all_posts", move |session| {
                Box::pin(async move {
                    let detached =
                        ContentLifecycle::detach_group(session, OwnerKind::PostData, user_id)
                            .await?;
                    Ok::<_, ContentUseCaseError>(detached)
                })
            })
            .await?;

        info!(user_id, detached, "posts_of_user_deleted");
        Ok(detached)
    }
}

/// A post whose slots belong to another user is reported as not found.
async fn ensure_post_owner(
    session: &mut dyn StoreSession,
    user_id: i64,
    post_id: i64,
) -> Result<(), ContentUseCaseError> {
    let slots = session
        .list_contents(ContentScope::Owner {
            kind: OwnerKind::PostData,
            owner_id: post_id,
        })
        .await?;

    if slots.iter().any(|slot| slot.group_id() != user_id) {
        return Err(ContentUseCaseError::NotFound(format!(
            "post {} of user {}",
            post_id, user_id
        )));
    }
    Ok(())
}
