use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::entities::{BlobEntry, OwnedContent};
use crate::domain::value_objects::{ContentTag, OwnerKey, OwnerKind};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Whether re-running the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

/// Result of an insert-or-increment on a blob entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainOutcome {
    Created,
    Incremented { ref_count: i64 },
}

/// Result of a decrement-or-delete on a blob entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No entry with that tag; nothing changed
    Missing,
    Decremented { ref_count: i64 },
    Removed,
}

/// Which owned-content rows a bulk operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentScope {
    /// Every slot of one owner (e.g. all data of one post)
    Owner { kind: OwnerKind, owner_id: i64 },
    /// Every owner of a kind belonging to one group (e.g. all posts of a user)
    Group { kind: OwnerKind, group_id: i64 },
}

/// Stored vs. actual reference count of one blob entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTally {
    pub tag: ContentTag,
    pub stored: i64,
    pub referenced: i64,
}

/// Opens units of work against the persistence backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Begin a transaction. Dropping the returned session without
    /// [`StoreSession::commit`] rolls every change back.
    async fn begin(&self) -> Result<Box<dyn StoreSession>, RepositoryError>;
}

/// One transaction over blob entries and owned-content rows.
///
/// Every write made through a session becomes visible to other sessions at
/// commit, all at once, or never.
#[async_trait]
pub trait StoreSession: Send {
    /// Insert the entry with ref_count 1, or increment the existing one.
    async fn upsert_entry(
        &mut self,
        tag: &ContentTag,
        data: &Bytes,
    ) -> Result<RetainOutcome, RepositoryError>;

    /// Decrement the entry, deleting it when the count reaches zero.
    async fn release_entry(&mut self, tag: &ContentTag) -> Result<ReleaseOutcome, RepositoryError>;

    async fn find_entry(&mut self, tag: &ContentTag) -> Result<Option<BlobEntry>, RepositoryError>;

    /// Load an owner's content row, locking it for the rest of the session.
    async fn find_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError>;

    /// Load an owner's content row without locking it. For read paths only.
    async fn read_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError>;

    /// Load and lock every content row in `scope`, ordered by owner then slot.
    async fn list_contents(
        &mut self,
        scope: ContentScope,
    ) -> Result<Vec<OwnedContent>, RepositoryError>;

    /// Create an owner's content row. Fails with [`RepositoryError::Conflict`]
    /// when the row exists, including one created by a concurrent session.
    async fn insert_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError>;

    /// Update the tag, media type and timestamp of an existing row. The
    /// row's group never changes.
    async fn save_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError>;

    /// Remove an owner's row. The row must no longer reference a tag that
    /// is freed later in the session.
    async fn delete_content(&mut self, owner: &OwnerKey) -> Result<(), RepositoryError>;

    /// Block every other writer until this session ends.
    async fn lock_exclusive(&mut self) -> Result<(), RepositoryError>;

    /// Stored count and live owner references for every entry, plus tags
    /// referenced by owners that have no entry (`stored == 0`).
    async fn tally_references(&mut self) -> Result<Vec<RefTally>, RepositoryError>;

    /// Overwrite an entry's count; zero deletes it.
    async fn set_ref_count(&mut self, tag: &ContentTag, ref_count: i64)
        -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}
