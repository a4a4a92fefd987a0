//! Owner-side reference bookkeeping.
//!
//! An owner's content field changes together with the matching retain/free
//! inside one [`StoreSession`]. Either both the field and the reference count
//! change, or neither does.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::application::blob_store::{free_in, retain_in};
use crate::application::errors::BlobStoreError;
use crate::application::ports::{ContentScope, StoreSession};
use crate::domain::entities::OwnedContent;
use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey, OwnerKind};

/// What a field change did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub tag: Option<ContentTag>,
    pub previous: Option<ContentTag>,
}

pub struct ContentLifecycle;

impl ContentLifecycle {
    /// Point `owner` at `data`: retain the new bytes, save the field, then
    /// free whatever the field held before.
    ///
    /// Retaining before freeing keeps the entry alive when the new bytes
    /// equal the old ones.
    pub async fn set_content(
        session: &mut dyn StoreSession,
        owner: OwnerKey,
        group_id: i64,
        data: &Bytes,
        media_type: MediaType,
        now: DateTime<Utc>,
    ) -> Result<ContentChange, BlobStoreError> {
        let (mut content, exists) = match session.find_content(&owner).await? {
            Some(content) => (content, true),
            None => (OwnedContent::empty(owner, group_id, now), false),
        };

        let tag = retain_in(session, data).await?;
        let previous = content.assign(tag.clone(), media_type, now);
        if exists {
            session.save_content(&content).await?;
        } else {
            // Nothing to lock yet; a concurrent creator makes this a conflict.
            session.insert_content(&content).await?;
        }

        if let Some(old) = &previous {
            free_in(session, old).await?;
        }

        debug!(owner = %owner, tag = %tag, replaced = previous.is_some(), "owner_content_set");

        Ok(ContentChange {
            tag: Some(tag),
            previous,
        })
    }

    /// Clear `owner`'s field and free the tag it held.
    ///
    /// Returns the freed tag; `None` when the field was already empty.
    pub async fn detach(
        session: &mut dyn StoreSession,
        owner: OwnerKey,
        now: DateTime<Utc>,
    ) -> Result<Option<ContentTag>, BlobStoreError> {
        let Some(mut content) = session.find_content(&owner).await? else {
            return Ok(None);
        };

        Self::clear_and_free(session, &mut content, now).await
    }

    /// Detach every slot of one owner (e.g. all data items of one post).
    pub async fn detach_owner(
        session: &mut dyn StoreSession,
        kind: OwnerKind,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, BlobStoreError> {
        let contents = session
            .list_contents(ContentScope::Owner { kind, owner_id })
            .await?;
        Self::detach_all(session, contents, now).await
    }

    /// Hard-delete every owner of `kind` in a group (e.g. all posts of one
    /// user). Rows are removed, and the tags of those that held content are
    /// freed. Returns how many held content.
    pub async fn detach_group(
        session: &mut dyn StoreSession,
        kind: OwnerKind,
        group_id: i64,
    ) -> Result<usize, BlobStoreError> {
        let contents = session
            .list_contents(ContentScope::Group { kind, group_id })
            .await?;

        let mut detached = 0;
        for content in contents {
            session.delete_content(content.owner()).await?;
            if let Some(tag) = content.tag() {
                free_in(session, tag).await?;
                debug!(owner = %content.owner(), tag = %tag, "owner_content_removed");
                detached += 1;
            }
        }
        Ok(detached)
    }

    /// Detach the slots of `owner_id` at index `keep` and above.
    pub async fn truncate_slots(
        session: &mut dyn StoreSession,
        kind: OwnerKind,
        owner_id: i64,
        keep: i32,
        now: DateTime<Utc>,
    ) -> Result<usize, BlobStoreError> {
        let contents = session
            .list_contents(ContentScope::Owner { kind, owner_id })
            .await?
            .into_iter()
            .filter(|content| content.owner().slot >= keep)
            .collect();
        Self::detach_all(session, contents, now).await
    }

    async fn detach_all(
        session: &mut dyn StoreSession,
        contents: Vec<OwnedContent>,
        now: DateTime<Utc>,
    ) -> Result<usize, BlobStoreError> {
        let mut detached = 0;
        for mut content in contents {
            if Self::clear_and_free(session, &mut content, now).await?.is_some() {
                detached += 1;
            }
        }
        Ok(detached)
    }

    async fn clear_and_free(
        session: &mut dyn StoreSession,
        content: &mut OwnedContent,
        now: DateTime<Utc>,
    ) -> Result<Option<ContentTag>, BlobStoreError> {
        let Some(previous) = content.clear(now) else {
            return Ok(None);
        };

        // The field must stop pointing at the tag before the entry can go.
        session.save_content(content).await?;
        free_in(session, &previous).await?;

        debug!(owner = %content.owner(), tag = %previous, "owner_content_detached");
        Ok(Some(previous))
    }
}
