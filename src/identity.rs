//! Identity and capability lookups against the host platform.
//!
//! The surrounding LMS owns users, enrolments, groups and capability
//! assignments. This plugin only ever reads them, so the whole surface is a
//! trait with a thin Postgres implementation over the host tables.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Capability required to see one's own certificate.
pub const CAP_VIEW: &str = "certificate:view";
/// Capability marking course managers; they are excluded from reports and
/// receive award notifications.
pub const CAP_MANAGE: &str = "certificate:manage";
/// Capability marking the teachers whose names are printed on the document.
pub const CAP_PRINT_TEACHER: &str = "certificate:printteacher";

/// A user as returned by capability and group lookups.
#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UserRef {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Display name for a single user, empty if the user is unknown.
    async fn full_name(&self, user_id: Uuid) -> Result<String, String>;

    /// All users holding `capability` in the course context.
    async fn users_with_capability(
        &self,
        course_id: Uuid,
        capability: &str,
    ) -> Result<Vec<UserRef>, String>;

    /// Members of a group, empty when the group is unknown or empty.
    async fn group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, String>;
}

/// Postgres-backed implementation reading the host LMS tables.
pub struct PgIdentityService {
    pool: PgPool,
}

impl PgIdentityService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityService for PgIdentityService {
    async fn full_name(&self, user_id: Uuid) -> Result<String, String> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT first_name, last_name FROM users WHERE id = $1 AND deleted = FALSE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        Ok(row
            .map(|(first, last)| format!("{} {}", first, last).trim().to_string())
            .unwrap_or_default())
    }

    async fn users_with_capability(
        &self,
        course_id: Uuid,
        capability: &str,
    ) -> Result<Vec<UserRef>, String> {
        let rows: Vec<(Uuid, String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email
              FROM users u
              JOIN capability_assignments ca ON ca.user_id = u.id
             WHERE ca.course_id = $1
               AND ca.capability = $2
               AND u.deleted = FALSE
             ORDER BY u.last_name, u.first_name
            "#,
        )
        .bind(course_id)
        .bind(capability)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        Ok(rows
            .into_iter()
            .map(|(id, first_name, last_name, email)| UserRef {
                id,
                first_name,
                last_name,
                email,
            })
            .collect())
    }

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, String> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM group_members WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.to_string())?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
