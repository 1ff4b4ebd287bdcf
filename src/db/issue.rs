//! Postgres implementation of the issuance store.
//!
//! The one-per-user invariant and ledger-wide code uniqueness live in the
//! schema as unique indexes; this impl translates their violations (SQLSTATE
//! 23505) into `StoreError::Conflict` for the ledger to resolve.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::issue::{IssuanceRecord, IssueQuery, IssueStore, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgIssueStore {
    pool: PgPool,
}

impl PgIssueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict;
        }
    }
    backend(e)
}

#[async_trait]
impl IssueStore for PgIssueStore {
    async fn find(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<IssuanceRecord>, StoreError> {
        sqlx::query_as::<_, IssuanceRecord>(
            "SELECT id, certificate_id, user_id, code, created_at \
               FROM certificate_issues WHERE certificate_id = $1 AND user_id = $2",
        )
        .bind(certificate_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn insert(&self, record: &IssuanceRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO certificate_issues (id, certificate_id, user_id, code, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.certificate_id)
        .bind(record.user_id)
        .bind(&record.code)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        Ok(())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM certificate_issues WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.0)
    }

    async fn list_for_certificate(
        &self,
        certificate_id: Uuid,
        query: &IssueQuery,
    ) -> Result<Vec<IssuanceRecord>, StoreError> {
        // Sort keys are whitelisted by IssueSort, safe to splice.
        let sql = format!(
            "SELECT id, certificate_id, user_id, code, created_at \
               FROM certificate_issues \
              WHERE certificate_id = $1 \
                AND user_id <> ALL($2) \
                AND ($3::uuid[] IS NULL OR user_id = ANY($3)) \
              ORDER BY {} \
              OFFSET $4 LIMIT $5",
            query.sort.sql()
        );

        sqlx::query_as::<_, IssuanceRecord>(&sql)
            .bind(certificate_id)
            .bind(&query.exclude_users)
            .bind(&query.include_users)
            .bind(query.offset)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn list_for_user(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<IssuanceRecord>, StoreError> {
        sqlx::query_as::<_, IssuanceRecord>(
            "SELECT id, certificate_id, user_id, code, created_at \
               FROM certificate_issues \
              WHERE certificate_id = $1 AND user_id = $2 \
              ORDER BY created_at",
        )
        .bind(certificate_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn delete_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("DELETE FROM certificate_issues WHERE certificate_id = $1 RETURNING id")
                .bind(certificate_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
