//! Offline reference audit.
//!
//! Recomputes every entry's reference count from the owner rows and reports
//! entries whose stored count disagrees. With `fix` set, leaked entries are
//! removed and miscounted entries are corrected in the same transaction as
//! the scan. Writers are locked out for the whole run so the tally cannot go
//! stale before it is written back. Never scheduled; run it through the
//! `audit_refs` binary.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::blob_store::BlobStore;
use crate::application::errors::BlobStoreError;
use crate::domain::digest::verify;
use crate::domain::value_objects::ContentTag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Miscount {
    pub tag: ContentTag,
    pub stored: i64,
    pub referenced: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub entries_checked: usize,
    /// Entries no owner references
    pub leaked: Vec<ContentTag>,
    pub miscounted: Vec<Miscount>,
    /// Tags held by owners with no entry behind them
    pub dangling: Vec<ContentTag>,
    /// Entries whose bytes no longer hash to their tag
    pub corrupted: Vec<ContentTag>,
    pub repaired: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
            && self.miscounted.is_empty()
            && self.dangling.is_empty()
            && self.corrupted.is_empty()
    }

    /// Findings that `fix` cannot repair
    pub fn unrepairable(&self) -> usize {
        self.dangling.len() + self.corrupted.len()
    }
}

pub struct RefCountAuditor {
    store: Arc<BlobStore>,
}

impl RefCountAuditor {
    pub fn new(store: Arc<BlobStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, fix: bool) -> Result<AuditReport, BlobStoreError> {
        let report = self
            .store
            .run_in_session("audit_refs", move |session| {
                Box::pin(async move {
                    let mut report = AuditReport::default();

                    session.lock_exclusive().await?;
                    for tally in session.tally_references().await? {
                        let Some(entry) = session.find_entry(&tally.tag).await? else {
                            error!(tag = %tally.tag, referenced = tally.referenced, "blob_entry_dangling");
                            report.dangling.push(tally.tag);
                            continue;
                        };

                        report.entries_checked += 1;

                        if !verify(entry.tag(), entry.data()) {
                            error!(tag = %tally.tag, "blob_entry_corrupted");
                            report.corrupted.push(tally.tag.clone());
                        }

                        if tally.referenced == 0 {
                            warn!(tag = %tally.tag, stored = tally.stored, "blob_entry_leaked");
                            if fix {
                                session.set_ref_count(&tally.tag, 0).await?;
                                report.repaired += 1;
                            }
                            report.leaked.push(tally.tag);
                        } else if tally.referenced != tally.stored {
                            warn!(
                                tag = %tally.tag,
                                stored = tally.stored,
                                referenced = tally.referenced,
                                "blob_entry_miscounted"
                            );
                            if fix {
                                session
                                    .set_ref_count(&tally.tag, tally.referenced)
                                    .await?;
                                report.repaired += 1;
                            }
                            report.miscounted.push(Miscount {
                                tag: tally.tag,
                                stored: tally.stored,
                                referenced: tally.referenced,
                            });
                        }
                    }

                    Ok::<_, BlobStoreError>(report)
                })
            })
            .await?;

        info!(
            entries_checked = report.entries_checked,
            leaked = report.leaked.len(),
            miscounted = report.miscounted.len(),
            dangling = report.dangling.len(),
            corrupted = report.corrupted.len(),
            repaired = report.repaired,
            "reference_audit_finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ownership::ContentLifecycle;
    use crate::application::ports::SessionFactory;
    use crate::domain::digest::digest;
    use crate::domain::value_objects::{MediaType, OwnerKey};
    use crate::infrastructure::persistence::MemoryStore;
    use bytes::Bytes;
    use chrono::Utc;

    async fn fixture() -> (RefCountAuditor, Arc<BlobStore>, MemoryStore) {
        let memory = MemoryStore::new();
        let store = Arc::new(BlobStore::new(Arc::new(memory.clone())));

        let mut session = memory.begin().await.unwrap();
        ContentLifecycle::set_content(
            session.as_mut(),
            OwnerKey::avatar(1),
            1,
            &Bytes::from_static(b"owned"),
            MediaType::parse("image/png").unwrap(),
            Utc::now(),
        )
        .await
        .unwrap();
        session.commit().await.unwrap();

        (RefCountAuditor::new(Arc::clone(&store)), store, memory)
    }

    #[tokio::test]
    async fn test_consistent_store_is_clean() {
        let (auditor, _, _) = fixture().await;
        let report = auditor.run(false).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.entries_checked, 1);
    }

    #[tokio::test]
    async fn test_reports_without_fixing() {
        let (auditor, store, memory) = fixture().await;
        // A retain nobody records, and an extra count on an owned entry.
        store.retain(Bytes::from_static(b"leak")).await.unwrap();
        store.retain(Bytes::from_static(b"owned")).await.unwrap();

        let report = auditor.run(false).await.unwrap();

        assert_eq!(report.leaked, vec![digest(b"leak")]);
        assert_eq!(
            report.miscounted,
            vec![Miscount {
                tag: digest(b"owned"),
                stored: 2,
                referenced: 1
            }]
        );
        assert_eq!(report.repaired, 0);
        assert_eq!(memory.ref_count(&digest(b"leak")).await, Some(1));
    }

    #[tokio::test]
    async fn test_fix_repairs_leaks_and_counts() {
        let (auditor, store, memory) = fixture().await;
        store.retain(Bytes::from_static(b"leak")).await.unwrap();
        store.retain(Bytes::from_static(b"owned")).await.unwrap();

        let report = auditor.run(true).await.unwrap();
        assert_eq!(report.repaired, 2);

        assert_eq!(memory.ref_count(&digest(b"leak")).await, None);
        assert_eq!(memory.ref_count(&digest(b"owned")).await, Some(1));
        assert!(auditor.run(false).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_detects_corrupted_bytes() {
        let (auditor, _, memory) = fixture().await;
        assert!(
            memory
                .overwrite_data(&digest(b"owned"), Bytes::from_static(b"tampered"))
                .await
        );

        let report = auditor.run(true).await.unwrap();
        assert_eq!(report.corrupted, vec![digest(b"owned")]);
        assert_eq!(report.unrepairable(), 1);
    }
}
