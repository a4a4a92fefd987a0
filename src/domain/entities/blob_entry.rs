use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::domain::digest::digest;
use crate::domain::value_objects::ContentTag;

/// Blob entry - deduplicated bytes plus the number of owners referencing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    tag: ContentTag,
    data: Bytes,
    ref_count: i64,
    created_at: DateTime<Utc>,
}

impl BlobEntry {
    /// Create the entry for a first retain (ref_count = 1)
    pub fn new(data: Bytes) -> Self {
        Self {
            tag: digest(&data),
            data,
            ref_count: 1,
            created_at: Utc::now(),
        }
    }

    /// Reconstruct from storage
    pub fn reconstruct(
        tag: ContentTag,
        data: Bytes,
        ref_count: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tag,
            data,
            ref_count,
            created_at,
        }
    }

    pub fn retain(&mut self) {
        self.ref_count += 1;
    }

    /// Drop one reference. Returns true when the entry must be removed.
    pub fn release(&mut self) -> bool {
        if self.ref_count > 0 {
            self.ref_count -= 1;
        }
        self.ref_count == 0
    }

    // Getters
    pub fn tag(&self) -> &ContentTag {
        &self.tag
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn ref_count(&self) -> i64 {
        self.ref_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_has_one_reference() {
        let entry = BlobEntry::new(Bytes::from_static(b"hello"));
        assert_eq!(entry.ref_count(), 1);
        assert_eq!(entry.tag(), &digest(b"hello"));
        assert_eq!(entry.size_bytes(), 5);
    }

    #[test]
    fn test_retain_then_release() {
        let mut entry = BlobEntry::new(Bytes::from_static(b"hello"));
        entry.retain();
        assert_eq!(entry.ref_count(), 2);
        assert!(!entry.release());
        assert_eq!(entry.ref_count(), 1);
        assert!(entry.release());
        assert_eq!(entry.ref_count(), 0);
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let mut entry = BlobEntry::new(Bytes::from_static(b"x"));
        assert!(entry.release());
        assert!(entry.release());
        assert_eq!(entry.ref_count(), 0);
    }
}
