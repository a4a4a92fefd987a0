use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::ports::{
    ContentScope, RefTally, ReleaseOutcome, RepositoryError, RetainOutcome, SessionFactory,
    StoreSession,
};
use crate::domain::entities::{BlobEntry, OwnedContent};
use crate::domain::value_objects::{ContentTag, OwnerKey};

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<ContentTag, BlobEntry>,
    contents: BTreeMap<OwnerKey, OwnedContent>,
}

impl MemoryState {
    fn is_referenced(&self, tag: &ContentTag) -> bool {
        self.contents.values().any(|c| c.tag() == Some(tag))
    }
}

/// Prior value of a key touched by a session, restored on rollback
enum Undo {
    Entry(ContentTag, Option<BlobEntry>),
    Content(OwnerKey, Option<OwnedContent>),
}

/// In-process backend for tests and local development.
///
/// A session holds the store's lock from `begin` until it is committed or
/// dropped, so sessions are fully serialized. Changes are applied in place
/// and undone from a journal when a session is dropped uncommitted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin without waiting; `None` while another session is open.
    pub fn try_begin(&self) -> Option<Box<dyn StoreSession>> {
        let guard = Arc::clone(&self.state).try_lock_owned().ok()?;
        Some(Box::new(MemorySession::new(guard)))
    }

    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn ref_count(&self, tag: &ContentTag) -> Option<i64> {
        self.state
            .lock()
            .await
            .entries
            .get(tag)
            .map(BlobEntry::ref_count)
    }

    pub async fn content(&self, owner: &OwnerKey) -> Option<OwnedContent> {
        self.state.lock().await.contents.get(owner).cloned()
    }

    /// Overwrite stored bytes without touching the tag. Only useful for
    /// exercising corruption detection.
    pub async fn overwrite_data(&self, tag: &ContentTag, data: Bytes) -> bool {
        let mut state = self.state.lock().await;
        match state.entries.get(tag).cloned() {
            Some(entry) => {
                let replaced =
                    BlobEntry::reconstruct(tag.clone(), data, entry.ref_count(), entry.created_at());
                state.entries.insert(tag.clone(), replaced);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemorySession::new(guard)))
    }
}

struct MemorySession {
    state: OwnedMutexGuard<MemoryState>,
    journal: Vec<Undo>,
    committed: bool,
}

impl MemorySession {
    fn new(state: OwnedMutexGuard<MemoryState>) -> Self {
        Self {
            state,
            journal: Vec::new(),
            committed: false,
        }
    }

    fn put_entry(&mut self, tag: &ContentTag, entry: Option<BlobEntry>) {
        let previous = match entry {
            Some(entry) => self.state.entries.insert(tag.clone(), entry),
            None => self.state.entries.remove(tag),
        };
        self.journal.push(Undo::Entry(tag.clone(), previous));
    }

    fn remove_entry_checked(&mut self, tag: &ContentTag) -> Result<(), RepositoryError> {
        if self.state.is_referenced(tag) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "blob {} is still referenced by owned content",
                tag
            )));
        }
        self.put_entry(tag, None);
        Ok(())
    }
}

impl MemorySession {
    fn put_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError> {
        if let Some(tag) = content.tag() {
            if !self.state.entries.contains_key(tag) {
                return Err(RepositoryError::ConstraintViolation(format!(
                    "owned content {} references unknown blob {}",
                    content.owner(),
                    tag
                )));
            }
        }

        let owner = *content.owner();
        let previous = self.state.contents.insert(owner, content.clone());
        self.journal.push(Undo::Content(owner, previous));
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Entry(tag, Some(entry)) => {
                    self.state.entries.insert(tag, entry);
                }
                Undo::Entry(tag, None) => {
                    self.state.entries.remove(&tag);
                }
                Undo::Content(owner, Some(content)) => {
                    self.state.contents.insert(owner, content);
                }
                Undo::Content(owner, None) => {
                    self.state.contents.remove(&owner);
                }
            }
        }
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn upsert_entry(
        &mut self,
        tag: &ContentTag,
        data: &Bytes,
    ) -> Result<RetainOutcome, RepositoryError> {
        match self.state.entries.get(tag).cloned() {
            Some(mut entry) => {
                entry.retain();
                let ref_count = entry.ref_count();
                self.put_entry(tag, Some(entry));
                Ok(RetainOutcome::Incremented { ref_count })
            }
            None => {
                let entry = BlobEntry::reconstruct(tag.clone(), data.clone(), 1, Utc::now());
                self.put_entry(tag, Some(entry));
                Ok(RetainOutcome::Created)
            }
        }
    }

    async fn release_entry(&mut self, tag: &ContentTag) -> Result<ReleaseOutcome, RepositoryError> {
        let Some(mut entry) = self.state.entries.get(tag).cloned() else {
            return Ok(ReleaseOutcome::Missing);
        };

        if entry.release() {
            self.remove_entry_checked(tag)?;
            Ok(ReleaseOutcome::Removed)
        } else {
            let ref_count = entry.ref_count();
            self.put_entry(tag, Some(entry));
            Ok(ReleaseOutcome::Decremented { ref_count })
        }
    }

    async fn find_entry(&mut self, tag: &ContentTag) -> Result<Option<BlobEntry>, RepositoryError> {
        Ok(self.state.entries.get(tag).cloned())
    }

    async fn find_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError> {
        Ok(self.state.contents.get(owner).cloned())
    }

    async fn read_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError> {
        Ok(self.state.contents.get(owner).cloned())
    }

    async fn list_contents(
        &mut self,
        scope: ContentScope,
    ) -> Result<Vec<OwnedContent>, RepositoryError> {
        let selected = self
            .state
            .contents
            .values()
            .filter(|content| match scope {
                ContentScope::Owner { kind, owner_id } => {
                    content.owner().kind == kind && content.owner().owner_id == owner_id
                }
                ContentScope::Group { kind, group_id } => {
                    content.owner().kind == kind && content.group_id() == group_id
                }
            })
            .cloned()
            .collect();
        Ok(selected)
    }

    async fn insert_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError> {
        if self.state.contents.contains_key(content.owner()) {
            return Err(RepositoryError::Conflict(format!(
                "owned content {} already exists",
                content.owner()
            )));
        }
        self.put_content(content)
    }

    async fn save_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError> {
        let Some(existing) = self.state.contents.get(content.owner()) else {
            return Err(RepositoryError::Internal(format!(
                "no owned content row for {}",
                content.owner()
            )));
        };

        let updated = OwnedContent::reconstruct(
            *content.owner(),
            existing.group_id(),
            content.tag().cloned(),
            content.media_type().cloned(),
            content.updated_at(),
        );
        self.put_content(&updated)
    }

    async fn delete_content(&mut self, owner: &OwnerKey) -> Result<(), RepositoryError> {
        if let Some(previous) = self.state.contents.remove(owner) {
            self.journal.push(Undo::Content(*owner, Some(previous)));
        }
        Ok(())
    }

    async fn lock_exclusive(&mut self) -> Result<(), RepositoryError> {
        // The session already holds the only lock.
        Ok(())
    }

    async fn tally_references(&mut self) -> Result<Vec<RefTally>, RepositoryError> {
        let mut tallies: BTreeMap<ContentTag, RefTally> = self
            .state
            .entries
            .values()
            .map(|entry| {
                (
                    entry.tag().clone(),
                    RefTally {
                        tag: entry.tag().clone(),
                        stored: entry.ref_count(),
                        referenced: 0,
                    },
                )
            })
            .collect();

        for tag in self.state.contents.values().filter_map(OwnedContent::tag) {
            tallies
                .entry(tag.clone())
                .or_insert_with(|| RefTally {
                    tag: tag.clone(),
                    stored: 0,
                    referenced: 0,
                })
                .referenced += 1;
        }

        Ok(tallies.into_values().collect())
    }

    async fn set_ref_count(
        &mut self,
        tag: &ContentTag,
        ref_count: i64,
    ) -> Result<(), RepositoryError> {
        let Some(entry) = self.state.entries.get(tag).cloned() else {
            return Err(RepositoryError::Internal(format!("no blob entry for {}", tag)));
        };

        if ref_count <= 0 {
            return self.remove_entry_checked(tag);
        }

        let updated = BlobEntry::reconstruct(
            tag.clone(),
            entry.data().clone(),
            ref_count,
            entry.created_at(),
        );
        self.put_entry(tag, Some(updated));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        self.committed = true;
        self.journal.clear();
        Ok(())
    }
}
