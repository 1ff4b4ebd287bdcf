//! Grading Service adapter.
//!
//! Resolves grades, outcomes, completion dates and engagement time from the
//! host gradebook. Every lookup returns `Option`: absent data is a normal
//! condition that the content resolver turns into an empty string, never an
//! error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A raw grade as stored by the host, before display formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeData {
    pub value: f64,
    pub max: f64,
    pub letter: Option<String>,
    /// Name of the grade item, used as a display prefix for activity grades.
    pub item_name: String,
}

impl GradeData {
    pub fn percentage(&self) -> String {
        if self.max <= 0.0 {
            return String::new();
        }
        format!("{:.2}%", self.value / self.max * 100.0)
    }

    pub fn points(&self) -> String {
        format!("{:.2}/{:.2}", self.value, self.max)
    }
}

/// An outcome name/value pair for display as `"<name>: <value>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeData {
    pub name: String,
    pub value: String,
}

#[async_trait]
pub trait GradingService: Send + Sync {
    async fn course_grade(&self, course_id: Uuid, user_id: Uuid) -> Option<GradeData>;

    /// Grade for a specific grade item, referenced by host item id.
    async fn activity_grade(&self, item_id: i64, user_id: Uuid) -> Option<GradeData>;

    /// Aggregated grade for a grade category.
    async fn category_grade(&self, category_id: i64, user_id: Uuid) -> Option<GradeData>;

    async fn completion_date(&self, course_id: Uuid, user_id: Uuid) -> Option<DateTime<Utc>>;

    async fn activity_grade_date(&self, item_id: i64, user_id: Uuid) -> Option<DateTime<Utc>>;

    async fn outcome(&self, outcome_id: i64, user_id: Uuid) -> Option<OutcomeData>;

    /// Total seconds the user has spent in the course, for the
    /// required-engagement gate. No recorded activity is zero; a failed
    /// lookup is an error, never zero.
    async fn course_time_seconds(&self, course_id: Uuid, user_id: Uuid) -> Result<i64, String>;
}

#[derive(sqlx::FromRow)]
struct GradeRow {
    value: Option<f64>,
    max: f64,
    letter: Option<String>,
    item_name: String,
}

impl GradeRow {
    fn into_grade(self) -> Option<GradeData> {
        Some(GradeData {
            value: self.value?,
            max: self.max,
            letter: self.letter,
            item_name: self.item_name,
        })
    }
}

/// Postgres-backed adapter over the host gradebook tables.
pub struct PgGradingService {
    pool: PgPool,
}

impl PgGradingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradingService for PgGradingService {
    async fn course_grade(&self, course_id: Uuid, user_id: Uuid) -> Option<GradeData> {
        let row = sqlx::query_as::<_, GradeRow>(
            r#"
            SELECT g.final_grade AS value, i.grade_max AS max, g.letter, i.name AS item_name
              FROM grade_items i
              LEFT JOIN grades g ON g.item_id = i.id AND g.user_id = $2
             WHERE i.course_id = $1 AND i.item_type = 'course'
            "#,
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| log::warn!("course grade lookup failed: {}", e))
        .ok()
        .flatten()?;
        row.into_grade()
    }

    async fn activity_grade(&self, item_id: i64, user_id: Uuid) -> Option<GradeData> {
        let row = sqlx::query_as::<_, GradeRow>(
            r#"
            SELECT g.final_grade AS value, i.grade_max AS max, g.letter, i.name AS item_name
              FROM grade_items i
              LEFT JOIN grades g ON g.item_id = i.id AND g.user_id = $2
             WHERE i.id = $1 AND i.item_type = 'activity'
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| log::warn!("activity grade lookup failed: {}", e))
        .ok()
        .flatten()?;
        row.into_grade()
    }

    async fn category_grade(&self, category_id: i64, user_id: Uuid) -> Option<GradeData> {
        let row = sqlx::query_as::<_, GradeRow>(
            r#"
            SELECT g.final_grade AS value, i.grade_max AS max, g.letter, i.name AS item_name
              FROM grade_items i
              LEFT JOIN grades g ON g.item_id = i.id AND g.user_id = $2
             WHERE i.category_id = $1 AND i.item_type = 'category'
            "#,
        )
        .bind(category_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| log::warn!("category grade lookup failed: {}", e))
        .ok()
        .flatten()?;
        row.into_grade()
    }

    async fn completion_date(&self, course_id: Uuid, user_id: Uuid) -> Option<DateTime<Utc>> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            "SELECT MAX(completed_at) FROM course_completions WHERE course_id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| log::warn!("completion date lookup failed: {}", e))
        .ok()
        .flatten();
        row.and_then(|(ts,)| ts)
    }

    async fn activity_grade_date(&self, item_id: i64, user_id: Uuid) -> Option<DateTime<Utc>> {
        let row: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT graded_at FROM grades WHERE item_id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| log::warn!("grade date lookup failed: {}", e))
                .ok()
                .flatten();
        row.and_then(|(ts,)| ts)
    }

    async fn outcome(&self, outcome_id: i64, user_id: Uuid) -> Option<OutcomeData> {
        let row: Option<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT o.name, g.display_value
              FROM outcomes o
              LEFT JOIN outcome_grades g ON g.outcome_id = o.id AND g.user_id = $2
             WHERE o.id = $1
            "#,
        )
        .bind(outcome_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| log::warn!("outcome lookup failed: {}", e))
        .ok()
        .flatten();
        let (name, value) = row?;
        Some(OutcomeData {
            name,
            value: value?,
        })
    }

    async fn course_time_seconds(&self, course_id: Uuid, user_id: Uuid) -> Result<i64, String> {
        // The host keeps a per-session activity aggregate; summing it matches
        // the number the legacy log walk produced.
        let total: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT SUM(active_seconds) FROM course_sessions WHERE course_id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(total.and_then(|(secs,)| secs).unwrap_or(0))
    }
}
