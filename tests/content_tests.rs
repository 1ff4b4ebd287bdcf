//! Content resolution: grade/date/outcome selection, display formatting and
//! degradation to empty strings when data is absent.

mod common;

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use certificate_server::content::ContentResolver;
use certificate_server::grading::{GradeData, GradingService, OutcomeData};
use certificate_server::identity::{IdentityService, CAP_PRINT_TEACHER};
use certificate_server::issue::IssuanceRecord;

use common::{sample_certificate, sample_course, user_ref, MockGradingService, MockIdentityService};

fn issue_for(certificate_id: Uuid, user_id: Uuid) -> IssuanceRecord {
    IssuanceRecord {
        id: Uuid::new_v4(),
        certificate_id,
        user_id,
        code: "A1b2C3d4E5".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap(),
    }
}

fn resolver(grading: MockGradingService) -> (ContentResolver, Arc<MockIdentityService>) {
    let identity = Arc::new(MockIdentityService::new());
    let resolver = ContentResolver::new(
        Arc::new(grading) as Arc<dyn GradingService>,
        identity.clone() as Arc<dyn IdentityService>,
    );
    (resolver, identity)
}

#[tokio::test]
async fn course_grade_as_percentage_with_code() {
    let grading = MockGradingService {
        course_grade: Some(GradeData {
            value: 92.5,
            max: 100.0,
            letter: None,
            item_name: "Course total".to_string(),
        }),
        ..Default::default()
    };
    let (resolver, _) = resolver(grading);

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.grade_source = 1; // course grade
    certificate.grade_format = 1; // percentage
    certificate.print_number = true;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada Lovelace", &course)
        .await;

    assert_eq!(content.grade, "Course grade: 92.50%");
    assert_eq!(content.code, "A1b2C3d4E5");
    assert_eq!(content.recipient_name, "Ada Lovelace");
    assert_eq!(content.course_name, course.full_name);
}

#[tokio::test]
async fn completion_date_with_day_month_year_format() {
    let grading = MockGradingService {
        completion_date: Some(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()),
        ..Default::default()
    };
    let (resolver, _) = resolver(grading);

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.date_source = 2; // course completion
    certificate.date_format = 3;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.date, "14 February 2026");
}

#[tokio::test]
async fn missing_completion_falls_back_to_issue_date() {
    let (resolver, _) = resolver(MockGradingService::default());

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.date_source = 2;
    certificate.date_format = 1;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.date, "March 05, 2026");
}

#[tokio::test]
async fn activity_grade_uses_item_name_prefix() {
    let grading = MockGradingService {
        activity_grade: Some(GradeData {
            value: 18.0,
            max: 20.0,
            letter: None,
            item_name: "Final Quiz".to_string(),
        }),
        ..Default::default()
    };
    let (resolver, _) = resolver(grading);

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.grade_source = 42; // grade item id
    certificate.grade_format = 2; // points

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.grade, "Final Quiz grade: 18.00/20.00");
}

#[tokio::test]
async fn category_grade_prints_bare() {
    let grading = MockGradingService {
        category_grade: Some(GradeData {
            value: 80.0,
            max: 100.0,
            letter: Some("B".to_string()),
            item_name: "Assignments".to_string(),
        }),
        ..Default::default()
    };
    let (resolver, _) = resolver(grading);

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.grade_source = -7; // negated category id
    certificate.grade_format = 3; // letter

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.grade, "B");
}

#[tokio::test]
async fn absent_data_degrades_to_empty_strings() {
    let (resolver, _) = resolver(MockGradingService::default());

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.grade_source = 1;
    certificate.outcome_source = 9;
    certificate.print_number = false;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.grade, "");
    assert_eq!(content.outcome, "");
    assert_eq!(content.code, "");
    assert_eq!(content.date, "");
}

#[tokio::test]
async fn outcome_renders_name_and_value() {
    let grading = MockGradingService {
        outcome: Some(OutcomeData {
            name: "Collaboration".to_string(),
            value: "Excellent".to_string(),
        }),
        ..Default::default()
    };
    let (resolver, _) = resolver(grading);

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.outcome_source = 3;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.outcome, "Collaboration: Excellent");
}

#[tokio::test]
async fn teachers_are_sorted_by_surname() {
    let (resolver, identity) = resolver(MockGradingService::default());
    identity.grant(CAP_PRINT_TEACHER, user_ref("Grace", "Hopper"));
    identity.grant(CAP_PRINT_TEACHER, user_ref("Alan", "Turing"));
    identity.grant(CAP_PRINT_TEACHER, user_ref("Annie", "Easley"));

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.print_teacher = true;

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(
        content.teachers,
        vec!["Annie Easley", "Grace Hopper", "Alan Turing"]
    );
}

#[tokio::test]
async fn custom_text_and_hours_pass_through() {
    let (resolver, _) = resolver(MockGradingService::default());

    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.custom_text = Some("Awarded with distinction".to_string());
    certificate.print_hours = Some("40".to_string());

    let user = Uuid::new_v4();
    let issue = issue_for(certificate.id, user);
    let content = resolver
        .resolve(&certificate, &issue, user, "Ada", &course)
        .await;

    assert_eq!(content.custom_text, "Awarded with distinction");
    assert_eq!(content.credit_hours.as_deref(), Some("40"));
}
