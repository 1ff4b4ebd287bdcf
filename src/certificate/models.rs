use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// How the rendered document reaches the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Stream inline so the browser opens it in a viewer window.
    View,
    /// Stream with an attachment disposition to force a download prompt.
    Download,
    /// Email the document to the user, then stream it inline.
    Email,
}

impl DeliveryMode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(DeliveryMode::View),
            1 => Some(DeliveryMode::Download),
            2 => Some(DeliveryMode::Email),
            _ => None,
        }
    }
}

/// Date source selectors. Values above `DATE_ACTIVITY_THRESHOLD` reference a
/// grade item whose grade date is printed.
pub const DATE_NONE: i64 = 0;
pub const DATE_ISSUED: i64 = 1;
pub const DATE_COURSE_COMPLETION: i64 = 2;
pub const DATE_ACTIVITY_THRESHOLD: i64 = 2;

/// Grade source selectors. Positive values above 1 reference a grade item,
/// negative values reference a grade category by negated id.
pub const GRADE_NONE: i64 = 0;
pub const GRADE_COURSE: i64 = 1;

/// Grade display formats.
pub const GRADE_FORMAT_PERCENTAGE: i32 = 1;
pub const GRADE_FORMAT_POINTS: i32 = 2;
pub const GRADE_FORMAT_LETTER: i32 = 3;

/// Administrator-configured certificate for one course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CertificateDefinition {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub intro: Option<String>,
    /// Template registry id, e.g. "achievement" or "regional".
    pub template: String,
    /// "L" for landscape, "P" for portrait.
    pub orientation: String,
    /// Border image name, if any.
    pub border_style: Option<String>,
    /// 0 = no frame, 1 black, 2 brown, 3 blue, 4 green.
    pub border_color: i32,
    pub watermark: Option<String>,
    pub signature: Option<String>,
    pub seal: Option<String>,
    /// 0 = view in browser, 1 = force download, 2 = email.
    pub delivery: i32,
    /// Persist the rendered document keyed by issuance id.
    pub save_copy: bool,
    pub email_teachers: bool,
    /// Comma-separated extra notification addresses.
    pub email_others: Option<String>,
    /// Minimum minutes the user must have spent in the course, 0 disables.
    pub required_minutes: i32,
    pub date_source: i64,
    pub date_format: i32,
    pub grade_source: i64,
    pub grade_format: i32,
    pub outcome_source: i64,
    pub print_hours: Option<String>,
    pub print_teacher: bool,
    pub print_number: bool,
    pub custom_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificateDefinition {
    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_i32(self.delivery).unwrap_or(DeliveryMode::View)
    }
}

/// A course as the host platform stores it. Read-only from this plugin.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub short_name: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCertificateRequest {
    pub course_id: Uuid,
    pub name: String,
    pub intro: Option<String>,
    pub template: String,
    pub orientation: String,
    pub border_style: Option<String>,
    #[serde(default)]
    pub border_color: i32,
    pub watermark: Option<String>,
    pub signature: Option<String>,
    pub seal: Option<String>,
    #[serde(default)]
    pub delivery: i32,
    #[serde(default)]
    pub save_copy: bool,
    #[serde(default)]
    pub email_teachers: bool,
    pub email_others: Option<String>,
    #[serde(default)]
    pub required_minutes: i32,
    #[serde(default)]
    pub date_source: i64,
    #[serde(default = "default_format")]
    pub date_format: i32,
    #[serde(default)]
    pub grade_source: i64,
    #[serde(default = "default_format")]
    pub grade_format: i32,
    #[serde(default)]
    pub outcome_source: i64,
    pub print_hours: Option<String>,
    #[serde(default)]
    pub print_teacher: bool,
    #[serde(default)]
    pub print_number: bool,
    pub custom_text: Option<String>,
}

fn default_format() -> i32 {
    1
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCertificateRequest {
    pub name: Option<String>,
    pub intro: Option<String>,
    pub template: Option<String>,
    pub orientation: Option<String>,
    pub border_style: Option<String>,
    pub border_color: Option<i32>,
    pub watermark: Option<String>,
    pub signature: Option<String>,
    pub seal: Option<String>,
    pub delivery: Option<i32>,
    pub save_copy: Option<bool>,
    pub email_teachers: Option<bool>,
    pub email_others: Option<String>,
    pub required_minutes: Option<i32>,
    pub date_source: Option<i64>,
    pub date_format: Option<i32>,
    pub grade_source: Option<i64>,
    pub grade_format: Option<i32>,
    pub outcome_source: Option<i64>,
    pub print_hours: Option<String>,
    pub print_teacher: Option<bool>,
    pub print_number: Option<bool>,
    pub custom_text: Option<String>,
}

impl CreateCertificateRequest {
    /// Validate the request and return every problem found.
    pub fn validate(&self, known_templates: &[&str]) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if !known_templates.contains(&self.template.as_str()) {
            errors.push(format!("unknown template '{}'", self.template));
        }
        if self.orientation != "L" && self.orientation != "P" {
            errors.push("orientation must be 'L' or 'P'".to_string());
        }
        if !(0..=4).contains(&self.border_color) {
            errors.push("border_color must be between 0 and 4".to_string());
        }
        if DeliveryMode::from_i32(self.delivery).is_none() {
            errors.push("delivery must be 0, 1 or 2".to_string());
        }
        if self.required_minutes < 0 {
            errors.push("required_minutes must not be negative".to_string());
        }
        if self.date_source < 0 {
            errors.push("date_source must not be negative".to_string());
        }
        if !(1..=5).contains(&self.date_format) {
            errors.push("date_format must be between 1 and 5".to_string());
        }
        if !(1..=3).contains(&self.grade_format) {
            errors.push("grade_format must be 1, 2 or 3".to_string());
        }
        if self.outcome_source < 0 {
            errors.push("outcome_source must not be negative".to_string());
        }
        if let Some(others) = &self.email_others {
            push_email_errors(others, &mut errors);
        }
        push_image_name_errors(
            [
                ("border_style", &self.border_style),
                ("watermark", &self.watermark),
                ("signature", &self.signature),
                ("seal", &self.seal),
            ],
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

impl UpdateCertificateRequest {
    /// Validate whatever fields the partial update touches, under the same
    /// rules as creation.
    pub fn validate(&self, known_templates: &[&str]) -> Result<(), String> {
        let mut errors = Vec::new();

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                errors.push("name must not be empty".to_string());
            }
        }
        if let Some(template) = &self.template {
            if !known_templates.contains(&template.as_str()) {
                errors.push(format!("unknown template '{}'", template));
            }
        }
        if let Some(orientation) = &self.orientation {
            if orientation != "L" && orientation != "P" {
                errors.push("orientation must be 'L' or 'P'".to_string());
            }
        }
        if self.border_color.is_some_and(|c| !(0..=4).contains(&c)) {
            errors.push("border_color must be between 0 and 4".to_string());
        }
        if self
            .delivery
            .is_some_and(|d| DeliveryMode::from_i32(d).is_none())
        {
            errors.push("delivery must be 0, 1 or 2".to_string());
        }
        if self.required_minutes.is_some_and(|m| m < 0) {
            errors.push("required_minutes must not be negative".to_string());
        }
        if self.date_source.is_some_and(|s| s < 0) {
            errors.push("date_source must not be negative".to_string());
        }
        if self.date_format.is_some_and(|f| !(1..=5).contains(&f)) {
            errors.push("date_format must be between 1 and 5".to_string());
        }
        if self.grade_format.is_some_and(|f| !(1..=3).contains(&f)) {
            errors.push("grade_format must be 1, 2 or 3".to_string());
        }
        if self.outcome_source.is_some_and(|s| s < 0) {
            errors.push("outcome_source must not be negative".to_string());
        }
        if let Some(others) = &self.email_others {
            push_email_errors(others, &mut errors);
        }
        push_image_name_errors(
            [
                ("border_style", &self.border_style),
                ("watermark", &self.watermark),
                ("signature", &self.signature),
                ("seal", &self.seal),
            ],
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

fn push_email_errors(others: &str, errors: &mut Vec<String>) {
    for addr in others.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        if !crate::mail::is_valid_email(addr) {
            errors.push(format!("invalid notification address '{}'", addr));
        }
    }
}

/// Image references are bare file names inside the asset directories;
/// separators and parent components are rejected.
fn push_image_name_errors(fields: [(&str, &Option<String>); 4], errors: &mut Vec<String>) {
    for (field, value) in fields {
        if let Some(name) = value {
            if name.contains('/') || name.contains('\\') || name.contains("..") {
                errors.push(format!("{} must be a plain file name", field));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateCertificateRequest {
        serde_json::from_value(serde_json::json!({
            "course_id": "7f2c9f6a-3a53-4c2e-9a3e-0d5b9a0c1c11",
            "name": "Completion Certificate",
            "template": "achievement",
            "orientation": "L"
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let req = valid_request();
        assert!(req.validate(&["achievement", "regional"]).is_ok());
        assert_eq!(req.date_format, 1);
        assert_eq!(req.grade_format, 1);
        assert_eq!(req.delivery, 0);
    }

    #[test]
    fn test_rejects_bad_orientation_and_template() {
        let mut req = valid_request();
        req.orientation = "X".to_string();
        req.template = "fancy".to_string();
        let err = req.validate(&["achievement", "regional"]).unwrap_err();
        assert!(err.contains("orientation"));
        assert!(err.contains("unknown template"));
    }

    #[test]
    fn test_rejects_invalid_notification_address() {
        let mut req = valid_request();
        req.email_others = Some("dean@example.edu, not-an-address".to_string());
        let err = req.validate(&["achievement"]).unwrap_err();
        assert!(err.contains("not-an-address"));
    }

    #[test]
    fn test_negative_category_reference_is_allowed_for_grade() {
        let mut req = valid_request();
        req.grade_source = -42;
        assert!(req.validate(&["achievement"]).is_ok());
    }

    #[test]
    fn test_rejects_image_names_with_path_separators() {
        let mut req = valid_request();
        req.watermark = Some("../../etc/passwd.png".to_string());
        req.seal = Some("..\\secrets.png".to_string());
        let err = req.validate(&["achievement"]).unwrap_err();
        assert!(err.contains("watermark"));
        assert!(err.contains("seal"));
    }

    #[test]
    fn test_update_validates_touched_fields() {
        let update = UpdateCertificateRequest {
            date_format: Some(9),
            delivery: Some(7),
            border_color: Some(-1),
            email_others: Some("not-an-address".to_string()),
            border_style: Some("../escape.png".to_string()),
            ..Default::default()
        };
        let err = update.validate(&["achievement"]).unwrap_err();
        assert!(err.contains("date_format"));
        assert!(err.contains("delivery"));
        assert!(err.contains("border_color"));
        assert!(err.contains("not-an-address"));
        assert!(err.contains("border_style"));
    }

    #[test]
    fn test_update_with_no_fields_is_valid() {
        let update = UpdateCertificateRequest::default();
        assert!(update.validate(&["achievement"]).is_ok());
    }
}
