//! Issue Ledger - owns the one-issuance-per-user-per-certificate invariant.
//!
//! The ledger itself is storage-agnostic; `IssueStore` is implemented over
//! Postgres in `crate::db::issue` and over memory in tests. Uniqueness is
//! enforced by the store's constraints, not by application-level locking.

pub mod ledger;

pub use ledger::IssueLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// The durable record that a user has received a certificate.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct IssuanceRecord {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub user_id: Uuid,
    /// Opaque verification code, unique across the whole ledger.
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the manager report: an issuance plus the holder's name.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueReportRow {
    pub issue: IssuanceRecord,
    pub user_name: String,
}

/// Sort keys accepted by the report listing. Whitelisted so the Postgres
/// store can splice them into SQL safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueSort {
    #[default]
    CreatedAsc,
    CreatedDesc,
    Code,
}

impl IssueSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_asc" => Some(IssueSort::CreatedAsc),
            "created_desc" => Some(IssueSort::CreatedDesc),
            "code" => Some(IssueSort::Code),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            IssueSort::CreatedAsc => "created_at ASC",
            IssueSort::CreatedDesc => "created_at DESC",
            IssueSort::Code => "code ASC",
        }
    }
}

/// Fully resolved listing query handed to the store. User scoping has already
/// been reduced to id sets by the ledger.
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    /// When set, only these users may appear (group scope).
    pub include_users: Option<Vec<Uuid>>,
    /// Users that must never appear (capability holders).
    pub exclude_users: Vec<Uuid>,
    pub sort: IssueSort,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; the record already exists.
    #[error("uniqueness constraint violated")]
    Conflict,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn find(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<IssuanceRecord>, StoreError>;

    /// Insert a fresh record. Returns `StoreError::Conflict` when either the
    /// (certificate, user) pair or the code already exists.
    async fn insert(&self, record: &IssuanceRecord) -> Result<(), StoreError>;

    /// Whether any issuance of any certificate already uses this code.
    async fn code_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn list_for_certificate(
        &self,
        certificate_id: Uuid,
        query: &IssueQuery,
    ) -> Result<Vec<IssuanceRecord>, StoreError>;

    async fn list_for_user(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<IssuanceRecord>, StoreError>;

    /// Remove every issuance of a certificate, returning the removed ids so
    /// callers can clean up stored documents.
    async fn delete_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}
