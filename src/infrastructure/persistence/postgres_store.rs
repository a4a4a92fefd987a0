use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::application::ports::{
    ContentScope, RefTally, ReleaseOutcome, RepositoryError, RetainOutcome, SessionFactory,
    StoreSession,
};
use crate::domain::entities::{BlobEntry, OwnedContent};
use crate::domain::value_objects::{ContentTag, MediaType, OwnerKey, OwnerKind};

/// Postgres backend. Each session is one database transaction.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionFactory for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, RepositoryError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgStoreSession { tx }))
    }
}

/// Map SQLSTATE codes onto retryable conflicts and constraint violations.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        let message = db_err.message().to_string();
        match db_err.code().as_deref() {
            // serialization_failure, deadlock_detected, unique_violation
            Some("40001") | Some("40P01") | Some("23505") => {
                return RepositoryError::Conflict(message)
            }
            // foreign_key_violation, check_violation
            Some("23503") | Some("23514") => return RepositoryError::ConstraintViolation(message),
            _ => {}
        }
    }
    RepositoryError::Database(err)
}

struct PgStoreSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreSession for PgStoreSession {
    async fn upsert_entry(
        &mut self,
        tag: &ContentTag,
        data: &Bytes,
    ) -> Result<RetainOutcome, RepositoryError> {
        let (ref_count,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO blobs (tag, data, size_bytes, ref_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (tag) DO UPDATE SET ref_count = blobs.ref_count + 1, last_retained_at = now()
            RETURNING ref_count
            "#,
        )
        .bind(tag.as_str())
        .bind(data.as_ref())
        .bind(data.len() as i64)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if ref_count == 1 {
            Ok(RetainOutcome::Created)
        } else {
            Ok(RetainOutcome::Incremented { ref_count })
        }
    }

    async fn release_entry(&mut self, tag: &ContentTag) -> Result<ReleaseOutcome, RepositoryError> {
        // The UPDATE takes the row lock, so concurrent frees of one tag queue here.
        let remaining = sqlx::query_as::<_, (i64,)>(
            r#"
            UPDATE blobs
            SET ref_count = ref_count - 1
            WHERE tag = $1
            RETURNING ref_count
            "#,
        )
        .bind(tag.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        match remaining {
            None => Ok(ReleaseOutcome::Missing),
            Some((ref_count,)) if ref_count > 0 => Ok(ReleaseOutcome::Decremented { ref_count }),
            Some(_) => {
                sqlx::query("DELETE FROM blobs WHERE tag = $1")
                    .bind(tag.as_str())
                    .execute(&mut *self.tx)
                    .await
                    .map_err(map_sqlx_error)?;
                Ok(ReleaseOutcome::Removed)
            }
        }
    }

    async fn find_entry(&mut self, tag: &ContentTag) -> Result<Option<BlobEntry>, RepositoryError> {
        let row = sqlx::query_as::<_, BlobRow>(
            r#"
            SELECT tag, data, ref_count, created_at
            FROM blobs
            WHERE tag = $1
            "#,
        )
        .bind(tag.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(BlobRow::into_domain).transpose()
    }

    async fn find_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError> {
        let row = sqlx::query_as::<_, OwnedContentRow>(
            r#"
            SELECT owner_kind, owner_id, slot, group_id, tag, media_type, updated_at
            FROM owned_content
            WHERE owner_kind = $1 AND owner_id = $2 AND slot = $3
            FOR UPDATE
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.owner_id)
        .bind(owner.slot)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(OwnedContentRow::into_domain).transpose()
    }

    async fn read_content(
        &mut self,
        owner: &OwnerKey,
    ) -> Result<Option<OwnedContent>, RepositoryError> {
        let row = sqlx::query_as::<_, OwnedContentRow>(
            r#"
            SELECT owner_kind, owner_id, slot, group_id, tag, media_type, updated_at
            FROM owned_content
            WHERE owner_kind = $1 AND owner_id = $2 AND slot = $3
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.owner_id)
        .bind(owner.slot)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(OwnedContentRow::into_domain).transpose()
    }

    async fn list_contents(
        &mut self,
        scope: ContentScope,
    ) -> Result<Vec<OwnedContent>, RepositoryError> {
        let query = match scope {
            ContentScope::Owner { kind, owner_id } => sqlx::query_as::<_, OwnedContentRow>(
                r#"
                SELECT owner_kind, owner_id, slot, group_id, tag, media_type, updated_at
                FROM owned_content
                WHERE owner_kind = $1 AND owner_id = $2
                ORDER BY slot
                FOR UPDATE
                "#,
            )
            .bind(kind.as_str())
            .bind(owner_id),
            ContentScope::Group { kind, group_id } => sqlx::query_as::<_, OwnedContentRow>(
                r#"
                SELECT owner_kind, owner_id, slot, group_id, tag, media_type, updated_at
                FROM owned_content
                WHERE owner_kind = $1 AND group_id = $2
                ORDER BY owner_id, slot
                FOR UPDATE
                "#,
            )
            .bind(kind.as_str())
            .bind(group_id),
        };

        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(OwnedContentRow::into_domain).collect()
    }

    async fn insert_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError> {
        let owner = content.owner();

        // A row created by a concurrent session raises unique_violation here,
        // which aborts this transaction for a retry that sees and locks it.
        sqlx::query(
            r#"
            INSERT INTO owned_content (owner_kind, owner_id, slot, group_id, tag, media_type, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.owner_id)
        .bind(owner.slot)
        .bind(content.group_id())
        .bind(content.tag().map(ContentTag::as_str))
        .bind(content.media_type().map(MediaType::as_str))
        .bind(content.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn save_content(&mut self, content: &OwnedContent) -> Result<(), RepositoryError> {
        let owner = content.owner();

        let result = sqlx::query(
            r#"
            UPDATE owned_content
            SET tag = $4, media_type = $5, updated_at = $6
            WHERE owner_kind = $1 AND owner_id = $2 AND slot = $3
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.owner_id)
        .bind(owner.slot)
        .bind(content.tag().map(ContentTag::as_str))
        .bind(content.media_type().map(MediaType::as_str))
        .bind(content.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Internal(format!(
                "no owned content row for {}",
                owner
            )));
        }
        Ok(())
    }

    async fn delete_content(&mut self, owner: &OwnerKey) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM owned_content
            WHERE owner_kind = $1 AND owner_id = $2 AND slot = $3
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.owner_id)
        .bind(owner.slot)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn lock_exclusive(&mut self) -> Result<(), RepositoryError> {
        // Conflicts with every INSERT/UPDATE/DELETE but still admits plain reads.
        sqlx::query("LOCK TABLE blobs, owned_content IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn tally_references(&mut self) -> Result<Vec<RefTally>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT COALESCE(b.tag, o.tag) AS tag,
                   COALESCE(b.ref_count, 0) AS stored,
                   COUNT(o.tag) AS referenced
            FROM blobs b
            FULL OUTER JOIN owned_content o ON o.tag = b.tag
            WHERE b.tag IS NOT NULL OR o.tag IS NOT NULL
            GROUP BY COALESCE(b.tag, o.tag), b.ref_count
            ORDER BY 1
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(tag, stored, referenced)| {
                Ok(RefTally {
                    tag: parse_tag(tag)?,
                    stored,
                    referenced,
                })
            })
            .collect()
    }

    async fn set_ref_count(
        &mut self,
        tag: &ContentTag,
        ref_count: i64,
    ) -> Result<(), RepositoryError> {
        let result = if ref_count <= 0 {
            sqlx::query("DELETE FROM blobs WHERE tag = $1")
                .bind(tag.as_str())
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?
        } else {
            sqlx::query("UPDATE blobs SET ref_count = $2 WHERE tag = $1")
                .bind(tag.as_str())
                .bind(ref_count)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Internal(format!("no blob entry for {}", tag)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

fn parse_tag(value: String) -> Result<ContentTag, RepositoryError> {
    ContentTag::parse(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct BlobRow {
    tag: String,
    data: Vec<u8>,
    ref_count: i64,
    created_at: DateTime<Utc>,
}

impl BlobRow {
    fn into_domain(self) -> Result<BlobEntry, RepositoryError> {
        Ok(BlobEntry::reconstruct(
            parse_tag(self.tag)?,
            Bytes::from(self.data),
            self.ref_count,
            self.created_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct OwnedContentRow {
    owner_kind: String,
    owner_id: i64,
    slot: i32,
    group_id: i64,
    tag: Option<String>,
    media_type: Option<String>,
    updated_at: DateTime<Utc>,
}

impl OwnedContentRow {
    fn into_domain(self) -> Result<OwnedContent, RepositoryError> {
        let kind = self
            .owner_kind
            .parse::<OwnerKind>()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let tag = self.tag.map(parse_tag).transpose()?;
        let media_type = self
            .media_type
            .as_deref()
            .map(MediaType::parse)
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        Ok(OwnedContent::reconstruct(
            OwnerKey {
                kind,
                owner_id: self.owner_id,
                slot: self.slot,
            },
            self.group_id,
            tag,
            media_type,
            self.updated_at,
        ))
    }
}
