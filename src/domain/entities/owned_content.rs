use chrono::{DateTime, Utc};

use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey};

/// Content field of an owning entity (an avatar, one post data slot).
///
/// The owner holds the tag and the format label; the blob store never sees
/// the label. A detached owner keeps its row with `tag == None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedContent {
    owner: OwnerKey,
    group_id: i64,
    tag: Option<ContentTag>,
    media_type: Option<MediaType>,
    updated_at: DateTime<Utc>,
}

impl OwnedContent {
    /// Empty content field for an owner seen for the first time
    pub fn empty(owner: OwnerKey, group_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            group_id,
            tag: None,
            media_type: None,
            updated_at: now,
        }
    }

    /// Reconstruct from storage
    pub fn reconstruct(
        owner: OwnerKey,
        group_id: i64,
        tag: Option<ContentTag>,
        media_type: Option<MediaType>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner,
            group_id,
            tag,
            media_type,
            updated_at,
        }
    }

    /// Point the field at new content. Returns the tag it held before.
    pub fn assign(
        &mut self,
        tag: ContentTag,
        media_type: MediaType,
        now: DateTime<Utc>,
    ) -> Option<ContentTag> {
        self.media_type = Some(media_type);
        self.updated_at = now;
        self.tag.replace(tag)
    }

    /// Clear the field. Returns the tag it held, if any.
    pub fn clear(&mut self, now: DateTime<Utc>) -> Option<ContentTag> {
        let previous = self.tag.take();
        if previous.is_some() {
            self.media_type = None;
            self.updated_at = now;
        }
        previous
    }

    // Getters
    pub fn owner(&self) -> &OwnerKey {
        &self.owner
    }

    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    pub fn tag(&self) -> Option<&ContentTag> {
        self.tag.as_ref()
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_content(&self) -> bool {
        self.tag.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::digest;

    fn png() -> MediaType {
        MediaType::parse("image/png").unwrap()
    }

    #[test]
    fn test_assign_returns_previous_tag() {
        let now = Utc::now();
        let mut content = OwnedContent::empty(OwnerKey::avatar(1), 1, now);
        assert_eq!(content.assign(digest(b"a"), png(), now), None);
        assert_eq!(content.assign(digest(b"b"), png(), now), Some(digest(b"a")));
        assert_eq!(content.tag(), Some(&digest(b"b")));
    }

    #[test]
    fn test_clear_empties_field() {
        let now = Utc::now();
        let mut content = OwnedContent::empty(OwnerKey::avatar(1), 1, now);
        content.assign(digest(b"a"), png(), now);

        assert_eq!(content.clear(now), Some(digest(b"a")));
        assert!(!content.has_content());
        assert!(content.media_type().is_none());
        assert_eq!(content.clear(now), None);
    }

    #[test]
    fn test_clear_on_empty_keeps_timestamp() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let mut content = OwnedContent::empty(OwnerKey::avatar(1), 1, created);
        content.clear(Utc::now());
        assert_eq!(content.updated_at(), created);
    }
}
