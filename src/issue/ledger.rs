//! Ledger operations: idempotent issuance, code generation, report listing.

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use std::sync::Arc;
use uuid::Uuid;

use super::{IssuanceRecord, IssueQuery, IssueReportRow, IssueSort, IssueStore, StoreError};
use crate::certificate::models::{CertificateDefinition, Course};
use crate::error::CertificateError;
use crate::identity::{IdentityService, CAP_MANAGE};
use crate::mail::Notifier;

/// Length of the verification code printed on certificates.
pub const CODE_LENGTH: usize = 10;

/// Collisions are vanishingly rare; more retries than this means the
/// code space is broken, not unlucky.
const MAX_CODE_ATTEMPTS: usize = 10;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

lazy_static! {
    static ref ISSUES_CREATED: IntCounter = register_int_counter!(
        "certificate_issues_created_total",
        "Number of issuance records created"
    )
    .unwrap();
}

/// Listing parameters as they arrive from the report endpoint.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub group_id: Option<Uuid>,
    pub sort: IssueSort,
    pub page: i64,
    pub per_page: i64,
}

pub struct IssueLedger {
    store: Arc<dyn IssueStore>,
    identity: Arc<dyn IdentityService>,
    notifier: Arc<Notifier>,
}

impl IssueLedger {
    pub fn new(
        store: Arc<dyn IssueStore>,
        identity: Arc<dyn IdentityService>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            identity,
            notifier,
        }
    }

    /// Return the user's issuance for this certificate, creating it on first
    /// call. Safe under concurrent invocation for the same pair: the store's
    /// uniqueness constraint decides the winner and the loser re-reads. A
    /// conflict on the code index alone retries with a fresh code, bounded.
    pub async fn get_or_create(
        &self,
        certificate: &CertificateDefinition,
        course: &Course,
        user_id: Uuid,
        user_name: &str,
    ) -> Result<IssuanceRecord, CertificateError> {
        if let Some(existing) = self
            .store
            .find(certificate.id, user_id)
            .await
            .map_err(store_err)?
        {
            return Ok(existing);
        }

        let mut record = IssuanceRecord {
            id: Uuid::new_v4(),
            certificate_id: certificate.id,
            user_id,
            code: self.generate_unique_code().await?,
            created_at: Utc::now(),
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            match self.store.insert(&record).await {
                Ok(()) => {
                    ISSUES_CREATED.inc();
                    log::info!(
                        "issued certificate {} to user {} (code {})",
                        certificate.id,
                        user_id,
                        record.code
                    );
                    self.spawn_notifications(certificate, course, user_id, user_name);
                    return Ok(record);
                }
                // A unique index rejected the write. If the pair now exists,
                // someone else created the record between our read and write
                // and theirs is the canonical one. Otherwise the code index
                // fired; draw a fresh code and try again.
                Err(StoreError::Conflict) => {
                    if let Some(winner) = self
                        .store
                        .find(certificate.id, user_id)
                        .await
                        .map_err(store_err)?
                    {
                        return Ok(winner);
                    }
                    record.code = self.generate_unique_code().await?;
                }
                Err(e) => return Err(store_err(e)),
            }
        }

        Err(CertificateError::Storage(
            "could not generate a unique certificate code".to_string(),
        ))
    }

    /// Issuances for the manager report. Group scoping and manager exclusion
    /// are resolved here; an empty group yields an empty list, not an error.
    pub async fn list_issues(
        &self,
        certificate_id: Uuid,
        course_id: Uuid,
        filter: &ListFilter,
    ) -> Result<Vec<IssueReportRow>, CertificateError> {
        let managers = self
            .identity
            .users_with_capability(course_id, CAP_MANAGE)
            .await
            .map_err(CertificateError::Storage)?;

        let include_users = match filter.group_id {
            Some(group_id) => {
                let members = self
                    .identity
                    .group_members(group_id)
                    .await
                    .map_err(CertificateError::Storage)?;
                if members.is_empty() {
                    return Ok(Vec::new());
                }
                Some(members)
            }
            None => None,
        };

        let per_page = filter.per_page.clamp(1, 200);
        let query = IssueQuery {
            include_users,
            exclude_users: managers.into_iter().map(|m| m.id).collect(),
            sort: filter.sort,
            offset: filter.page.max(0) * per_page,
            limit: per_page,
        };

        let records = self
            .store
            .list_for_certificate(certificate_id, &query)
            .await
            .map_err(store_err)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let user_name = self
                .identity
                .full_name(record.user_id)
                .await
                .unwrap_or_default();
            rows.push(IssueReportRow {
                issue: record,
                user_name,
            });
        }
        Ok(rows)
    }

    /// Historical issuances for the caller, for the reissue listing.
    /// Read-only, never creates.
    pub async fn issues_for_user(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<IssuanceRecord>, CertificateError> {
        self.store
            .list_for_user(certificate_id, user_id)
            .await
            .map_err(store_err)
    }

    /// Cascade helper for certificate deletion: drops all issuances and
    /// returns their ids for document cleanup.
    pub async fn delete_for_certificate(
        &self,
        certificate_id: Uuid,
    ) -> Result<Vec<Uuid>, CertificateError> {
        self.store
            .delete_for_certificate(certificate_id)
            .await
            .map_err(store_err)
    }

    /// Generate a code no issuance of any certificate uses yet. Each attempt
    /// is an independent draw plus a fresh existence check; the store's
    /// unique index on `code` is the final arbiter.
    async fn generate_unique_code(&self) -> Result<String, CertificateError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = random_code();
            if !self.store.code_exists(&code).await.map_err(store_err)? {
                return Ok(code);
            }
        }
        Err(CertificateError::Storage(
            "could not generate a unique certificate code".to_string(),
        ))
    }

    fn spawn_notifications(
        &self,
        certificate: &CertificateDefinition,
        course: &Course,
        user_id: Uuid,
        user_name: &str,
    ) {
        let wants_mail = certificate.email_teachers
            || certificate
                .email_others
                .as_deref()
                .is_some_and(|o| !o.trim().is_empty());
        if !wants_mail {
            return;
        }
        let notifier = self.notifier.clone();
        let certificate = certificate.clone();
        let course = course.clone();
        let user_name = user_name.to_string();
        // Notifications must not hold up the response path.
        tokio::spawn(async move {
            notifier
                .notify_awarded(&certificate, &course, &user_name, user_id)
                .await;
        });
    }
}

/// Fixed-length random code over letters and digits, derived from UUID
/// randomness so no extra RNG dependency is needed.
pub fn random_code() -> String {
    let bytes = Uuid::new_v4();
    bytes
        .as_bytes()
        .iter()
        .take(CODE_LENGTH)
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

fn store_err(e: StoreError) -> CertificateError {
    match e {
        StoreError::Conflict => CertificateError::Conflict,
        StoreError::Backend(msg) => CertificateError::Storage(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_shape() {
        for _ in 0..100 {
            let code = random_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(IssueSort::parse("created_asc"), Some(IssueSort::CreatedAsc));
        assert_eq!(IssueSort::parse("code"), Some(IssueSort::Code));
        assert_eq!(IssueSort::parse("DROP TABLE"), None);
        assert_eq!(IssueSort::default().sql(), "created_at ASC");
    }
}
