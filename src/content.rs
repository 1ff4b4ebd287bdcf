//! Content Resolver - computes every display string for one render.
//!
//! Resolution is request-scoped and never cached: grades and dates may change
//! between renders of the same immutable issuance. Absent data is always
//! degraded to an empty string, so a render can not fail because a grade,
//! outcome or completion date is missing.

use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::certificate::models::{
    CertificateDefinition, Course, DATE_ACTIVITY_THRESHOLD, DATE_COURSE_COMPLETION, DATE_ISSUED,
    DATE_NONE, GRADE_COURSE, GRADE_FORMAT_LETTER, GRADE_FORMAT_PERCENTAGE, GRADE_FORMAT_POINTS,
    GRADE_NONE,
};
use crate::grading::{GradeData, GradingService};
use crate::identity::{IdentityService, CAP_PRINT_TEACHER};
use crate::issue::IssuanceRecord;

/// Everything the renderer needs, fully stringified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedContent {
    pub recipient_name: String,
    pub course_name: String,
    pub date: String,
    pub grade: String,
    pub outcome: String,
    pub code: String,
    pub teachers: Vec<String>,
    pub credit_hours: Option<String>,
    pub custom_text: String,
}

pub struct ContentResolver {
    grading: Arc<dyn GradingService>,
    identity: Arc<dyn IdentityService>,
}

impl ContentResolver {
    pub fn new(grading: Arc<dyn GradingService>, identity: Arc<dyn IdentityService>) -> Self {
        Self { grading, identity }
    }

    pub async fn resolve(
        &self,
        certificate: &CertificateDefinition,
        issue: &IssuanceRecord,
        user_id: Uuid,
        user_name: &str,
        course: &Course,
    ) -> ResolvedContent {
        ResolvedContent {
            recipient_name: user_name.to_string(),
            course_name: course.full_name.clone(),
            date: self.resolve_date(certificate, issue, user_id, course).await,
            grade: self.resolve_grade(certificate, user_id, course).await,
            outcome: self.resolve_outcome(certificate, user_id).await,
            code: resolve_code(certificate, issue),
            teachers: self.resolve_teachers(certificate, course).await,
            credit_hours: certificate.print_hours.clone(),
            custom_text: certificate.custom_text.clone().unwrap_or_default(),
        }
    }

    /// Date selection falls back to the issuance creation time whenever the
    /// configured source has no data for this user.
    async fn resolve_date(
        &self,
        certificate: &CertificateDefinition,
        issue: &IssuanceRecord,
        user_id: Uuid,
        course: &Course,
    ) -> String {
        if certificate.date_source <= DATE_NONE {
            return String::new();
        }

        let mut date = issue.created_at;
        if certificate.date_source == DATE_COURSE_COMPLETION {
            if let Some(completed) = self.grading.completion_date(course.id, user_id).await {
                date = completed;
            }
        } else if certificate.date_source > DATE_ACTIVITY_THRESHOLD {
            if let Some(graded) = self
                .grading
                .activity_grade_date(certificate.date_source, user_id)
                .await
            {
                date = graded;
            }
        } else {
            debug_assert_eq!(certificate.date_source, DATE_ISSUED);
        }

        format_date(date, certificate.date_format)
    }

    async fn resolve_grade(
        &self,
        certificate: &CertificateDefinition,
        user_id: Uuid,
        course: &Course,
    ) -> String {
        if certificate.grade_source == GRADE_NONE {
            return String::new();
        }

        let (grade, prefix) = if certificate.grade_source == GRADE_COURSE {
            (
                self.grading.course_grade(course.id, user_id).await,
                Some("Course grade".to_string()),
            )
        } else if certificate.grade_source > GRADE_COURSE {
            let grade = self
                .grading
                .activity_grade(certificate.grade_source, user_id)
                .await;
            let prefix = grade.as_ref().map(|g| format!("{} grade", g.item_name));
            (grade, prefix)
        } else {
            // Negative values reference a category; those print bare, as the
            // gradebook report does.
            (
                self.grading
                    .category_grade(-certificate.grade_source, user_id)
                    .await,
                None,
            )
        };

        let Some(grade) = grade else {
            return String::new();
        };

        let value = format_grade_value(&grade, certificate.grade_format);
        if value.is_empty() {
            return String::new();
        }
        match prefix {
            Some(prefix) => format!("{}: {}", prefix, value),
            None => value,
        }
    }

    async fn resolve_outcome(&self, certificate: &CertificateDefinition, user_id: Uuid) -> String {
        if certificate.outcome_source <= 0 {
            return String::new();
        }
        match self
            .grading
            .outcome(certificate.outcome_source, user_id)
            .await
        {
            Some(outcome) => format!("{}: {}", outcome.name, outcome.value),
            None => String::new(),
        }
    }

    /// Teachers holding the print capability, sorted by surname.
    async fn resolve_teachers(
        &self,
        certificate: &CertificateDefinition,
        course: &Course,
    ) -> Vec<String> {
        if !certificate.print_teacher {
            return Vec::new();
        }
        match self
            .identity
            .users_with_capability(course.id, CAP_PRINT_TEACHER)
            .await
        {
            Ok(mut teachers) => {
                teachers.sort_by(|a, b| {
                    a.last_name
                        .cmp(&b.last_name)
                        .then_with(|| a.first_name.cmp(&b.first_name))
                });
                teachers.into_iter().map(|t| t.full_name()).collect()
            }
            Err(e) => {
                log::warn!("teacher lookup failed, omitting from certificate: {}", e);
                Vec::new()
            }
        }
    }
}

fn resolve_code(certificate: &CertificateDefinition, issue: &IssuanceRecord) -> String {
    if certificate.print_number {
        issue.code.clone()
    } else {
        String::new()
    }
}

fn format_grade_value(grade: &GradeData, format: i32) -> String {
    match format {
        GRADE_FORMAT_PERCENTAGE => grade.percentage(),
        GRADE_FORMAT_POINTS => grade.points(),
        GRADE_FORMAT_LETTER => grade.letter.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

/// The five supported date patterns.
pub fn format_date(date: DateTime<Utc>, format: i32) -> String {
    match format {
        1 => date.format("%B %d, %Y").to_string(),
        2 => {
            let day = date.day();
            format!(
                "{} {}{}, {}",
                date.format("%B"),
                day,
                ordinal_suffix(day),
                date.year()
            )
        }
        3 => date.format("%-d %B %Y").to_string(),
        4 => date.format("%B %Y").to_string(),
        5 => date.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

/// Suffix for a day of the month: 1st, 2nd, 3rd, 4th... 11th/12th/13th.
pub fn ordinal_suffix(day: u32) -> &'static str {
    if matches!(day % 100, 11 | 12 | 13) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}
