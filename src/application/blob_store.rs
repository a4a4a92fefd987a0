//! Reference-counted, content-addressed blob store.
//!
//! Identical bytes are stored once under their [`ContentTag`]. Every
//! [`retain`](BlobStore::retain) adds a reference and every
//! [`free`](BlobStore::free) drops one; the entry disappears inside the same
//! transaction that drops its last reference.
//!
//! The `*_in` functions run one store step inside a caller-provided
//! [`StoreSession`], so owners can combine their own field update with the
//! store call in a single transaction (see [`ownership`](super::ownership)).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::application::errors::{BlobStoreError, ContentUseCaseError};
use crate::application::ports::{
    ReleaseOutcome, RepositoryError, RetainOutcome, SessionFactory, StoreSession,
};
use crate::domain::digest::digest;
use crate::domain::entities::BlobEntry;
use crate::domain::value_objects::ContentTag;

/// Errors that may be resolved by re-running the transaction from scratch.
pub trait RetryableError: From<RepositoryError> + Send {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for BlobStoreError {
    fn is_retryable(&self) -> bool {
        BlobStoreError::is_retryable(self)
    }
}

impl RetryableError for ContentUseCaseError {
    fn is_retryable(&self) -> bool {
        matches!(self, ContentUseCaseError::Store(e) if e.is_retryable())
    }
}

/// Bounded retry with jittered exponential backoff for transaction conflicts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter_ceiling = (delay.as_millis() / 2) as u64;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ceiling)
        };

        delay + Duration::from_millis(jitter)
    }
}

/// Diagnostic view of an entry, without its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BlobStat {
    #[schema(value_type = String)]
    pub tag: ContentTag,
    pub ref_count: i64,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&BlobEntry> for BlobStat {
    fn from(entry: &BlobEntry) -> Self {
        Self {
            tag: entry.tag().clone(),
            ref_count: entry.ref_count(),
            size_bytes: entry.size_bytes(),
            created_at: entry.created_at(),
        }
    }
}

pub struct BlobStore {
    sessions: Arc<dyn SessionFactory>,
    retry: RetryPolicy,
}

impl BlobStore {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(sessions: Arc<dyn SessionFactory>, retry: RetryPolicy) -> Self {
        Self { sessions, retry }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionFactory> {
        &self.sessions
    }

    /// Store `data` (or add a reference to identical stored bytes) and return its tag.
    pub async fn retain(&self, data: Bytes) -> Result<ContentTag, BlobStoreError> {
        self.run_in_session("retain", move |session| {
            let data = data.clone();
            Box::pin(async move { retain_in(session, &data).await })
        })
        .await
    }

    /// Drop one reference to `tag`. Unknown tags are ignored.
    pub async fn free(&self, tag: &ContentTag) -> Result<(), BlobStoreError> {
        let tag = tag.clone();
        self.run_in_session("free", move |session| {
            let tag = tag.clone();
            Box::pin(async move { free_in(session, &tag).await.map(|_| ()) })
        })
        .await
    }

    /// Bytes stored under `tag`, or `None` if no entry exists.
    pub async fn get(&self, tag: &ContentTag) -> Result<Option<Bytes>, BlobStoreError> {
        let tag = tag.clone();
        self.run_in_session("get", move |session| {
            let tag = tag.clone();
            Box::pin(async move { get_in(session, &tag).await })
        })
        .await
    }

    /// Like [`get`](Self::get), for callers holding a reference to `tag`.
    /// A missing entry is a data-integrity fault, not a normal not-found.
    pub async fn get_or_fail(
        &self,
        tag: &ContentTag,
        context: &str,
    ) -> Result<Bytes, BlobStoreError> {
        match self.get(tag).await? {
            Some(data) => Ok(data),
            None => Err(integrity_fault(tag, context)),
        }
    }

    /// Parse an externally supplied tag string, then [`get`](Self::get).
    pub async fn get_by_str(&self, tag: &str) -> Result<Option<Bytes>, BlobStoreError> {
        let tag = ContentTag::parse(tag)?;
        self.get(&tag).await
    }

    /// Parse an externally supplied tag string, then [`free`](Self::free).
    pub async fn free_by_str(&self, tag: &str) -> Result<(), BlobStoreError> {
        let tag = ContentTag::parse(tag)?;
        self.free(&tag).await
    }

    pub async fn stat(&self, tag: &ContentTag) -> Result<Option<BlobStat>, BlobStoreError> {
        let tag = tag.clone();
        self.run_in_session("stat", move |session| {
            let tag = tag.clone();
            Box::pin(async move {
                let entry = session.find_entry(&tag).await?;
                Ok::<_, BlobStoreError>(entry.as_ref().map(BlobStat::from))
            })
        })
        .await
    }

    /// Run `work` in a fresh session and commit it.
    ///
    /// On a retryable error (from `work` or from commit) the session is rolled
    /// back and `work` runs again in a new session, up to the policy's attempt
    /// limit. `work` must therefore only capture owned values.
    pub async fn run_in_session<T, E, F>(&self, operation: &'static str, mut work: F) -> Result<T, E>
    where
        T: Send,
        E: RetryableError,
        F: for<'s> FnMut(&'s mut dyn StoreSession) -> BoxFuture<'s, Result<T, E>> + Send,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match self.sessions.begin().await {
                Ok(mut session) => match work(session.as_mut()).await {
                    Ok(value) => session.commit().await.map(|_| value).map_err(E::from),
                    Err(e) => Err(e),
                },
                Err(e) => Err(E::from(e)),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transaction_conflict_retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Retain `data` inside `session`.
pub async fn retain_in(
    session: &mut dyn StoreSession,
    data: &Bytes,
) -> Result<ContentTag, BlobStoreError> {
    let tag = digest(data);

    match session.upsert_entry(&tag, data).await? {
        RetainOutcome::Created => {
            info!(tag = %tag, size_bytes = data.len(), "blob_entry_created");
        }
        RetainOutcome::Incremented { ref_count } => {
            info!(tag = %tag, ref_count, "blob_entry_retained");
        }
    }

    Ok(tag)
}

/// Free `tag` inside `session`.
///
/// A backend refusing to delete an entry that an owner still references is
/// reported as [`BlobStoreError::DataIntegrityFault`].
pub async fn free_in(
    session: &mut dyn StoreSession,
    tag: &ContentTag,
) -> Result<ReleaseOutcome, BlobStoreError> {
    let outcome = match session.release_entry(tag).await {
        Ok(outcome) => outcome,
        Err(RepositoryError::ConstraintViolation(detail)) => {
            error!(tag = %tag, %detail, "blob_entry_still_referenced");
            return Err(BlobStoreError::DataIntegrityFault {
                tag: tag.to_string(),
                context: format!("entry reached zero references while still owned: {}", detail),
            });
        }
        Err(e) => return Err(e.into()),
    };

    match outcome {
        ReleaseOutcome::Missing => debug!(tag = %tag, "blob_entry_free_missing"),
        ReleaseOutcome::Decremented { ref_count } => {
            info!(tag = %tag, ref_count, "blob_entry_released")
        }
        ReleaseOutcome::Removed => info!(tag = %tag, "blob_entry_removed"),
    }

    Ok(outcome)
}

pub async fn get_in(
    session: &mut dyn StoreSession,
    tag: &ContentTag,
) -> Result<Option<Bytes>, BlobStoreError> {
    Ok(session.find_entry(tag).await?.map(BlobEntry::into_data))
}

pub async fn get_or_fail_in(
    session: &mut dyn StoreSession,
    tag: &ContentTag,
    context: &str,
) -> Result<Bytes, BlobStoreError> {
    get_in(session, tag)
        .await?
        .ok_or_else(|| integrity_fault(tag, context))
}

fn integrity_fault(tag: &ContentTag, context: &str) -> BlobStoreError {
    error!(tag = %tag, context, "blob_entry_missing_for_owner");
    BlobStoreError::DataIntegrityFault {
        tag: tag.to_string(),
        context: context.to_string(),
    }
}
