//! Digest function mapping raw bytes to a [`ContentTag`].
//!
//! SHA-256 over the exact bytes, hex encoded in lowercase. The mapping is pure:
//! no state, no I/O, and the same bytes always produce the same tag.

use sha2::{Digest, Sha256};

use crate::domain::value_objects::ContentTag;

/// Compute the tag of `data`.
pub fn digest(data: &[u8]) -> ContentTag {
    let hash_bytes = Sha256::digest(data);
    ContentTag::from_digest_hex(hex::encode(hash_bytes))
}

/// Incremental hasher for payloads that arrive in pieces.
///
/// Produces the same tag as [`digest`] over the concatenation of all chunks.
#[derive(Default, Clone)]
pub struct DigestWriter {
    hasher: Sha256,
    total_bytes: u64,
}

impl DigestWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.total_bytes += chunk.len() as u64;
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn finish(self) -> ContentTag {
        ContentTag::from_digest_hex(hex::encode(self.hasher.finalize()))
    }
}

/// Check that `data` still hashes to `tag`.
pub fn verify(tag: &ContentTag, data: &[u8]) -> bool {
    &digest(data) == tag
}
