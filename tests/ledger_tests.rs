//! Issuance ledger behavior: idempotence, code uniqueness, race resolution,
//! notifications and report listing.

mod common;

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use certificate_server::identity::{CAP_MANAGE, IdentityService};
use certificate_server::issue::ledger::{IssueLedger, ListFilter};
use certificate_server::issue::{IssueSort, IssueStore};
use certificate_server::mail::{MailGateway, Notifier};

use common::{
    sample_certificate, sample_course, user_ref, MemoryIssueStore, MockIdentityService,
    RecordingMailGateway,
};

struct Fixture {
    store: Arc<MemoryIssueStore>,
    identity: Arc<MockIdentityService>,
    mailer: Arc<RecordingMailGateway>,
    ledger: IssueLedger,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryIssueStore::new());
    let identity = Arc::new(MockIdentityService::new());
    let mailer = Arc::new(RecordingMailGateway::new());
    let notifier = Arc::new(Notifier::new(
        mailer.clone() as Arc<dyn MailGateway>,
        identity.clone() as Arc<dyn IdentityService>,
    ));
    let ledger = IssueLedger::new(
        store.clone() as Arc<dyn IssueStore>,
        identity.clone() as Arc<dyn IdentityService>,
        notifier,
    );
    Fixture {
        store,
        identity,
        mailer,
        ledger,
    }
}

#[tokio::test]
async fn repeated_views_reuse_the_same_issuance() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);
    let user = Uuid::new_v4();

    let first = f
        .ledger
        .get_or_create(&certificate, &course, user, "Ada Lovelace")
        .await
        .unwrap();
    let second = f
        .ledger
        .get_or_create(&certificate, &course, user, "Ada Lovelace")
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.code, second.code);
    assert_eq!(f.store.record_count(), 1);
}

#[tokio::test]
async fn codes_are_unique_across_certificates() {
    let f = fixture();
    let course = sample_course();
    let cert_a = sample_certificate(course.id);
    let cert_b = sample_certificate(course.id);
    let user = Uuid::new_v4();

    let a = f
        .ledger
        .get_or_create(&cert_a, &course, user, "Ada")
        .await
        .unwrap();
    let b = f
        .ledger
        .get_or_create(&cert_b, &course, user, "Ada")
        .await
        .unwrap();

    assert_ne!(a.code, b.code);
    assert_eq!(a.code.len(), 10);
    assert_eq!(b.code.len(), 10);
}

#[tokio::test]
async fn losing_a_creation_race_returns_the_winner() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);
    let user = Uuid::new_v4();

    // Another writer creates the record between our read and our insert.
    let raced = certificate_server::issue::IssuanceRecord {
        id: Uuid::new_v4(),
        certificate_id: certificate.id,
        user_id: user,
        code: "RACEDCODE0".to_string(),
        created_at: chrono::Utc::now(),
    };
    *f.store.inject_before_insert.write() = Some(raced.clone());

    let result = f
        .ledger
        .get_or_create(&certificate, &course, user, "Ada")
        .await
        .unwrap();

    assert_eq!(result.id, raced.id);
    assert_eq!(result.code, "RACEDCODE0");
    assert_eq!(f.store.record_count(), 1);
}

#[tokio::test]
async fn code_collisions_retry_until_an_insert_lands() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);
    let user = Uuid::new_v4();

    // Two inserts bounce off the code index before one lands; the caller
    // still gets an issuance, never a conflict.
    *f.store.force_conflicts.write() = 2;

    let issue = f
        .ledger
        .get_or_create(&certificate, &course, user, "Ada")
        .await
        .unwrap();

    assert_eq!(issue.code.len(), 10);
    assert_eq!(f.store.record_count(), 1);
    assert_eq!(*f.store.force_conflicts.read(), 0);
}

#[tokio::test]
async fn notifications_fire_once_on_creation_only() {
    let f = fixture();
    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.email_teachers = true;
    f.identity.grant(CAP_MANAGE, user_ref("Grace", "Hopper"));

    let user = Uuid::new_v4();
    f.ledger
        .get_or_create(&certificate, &course, user, "Ada")
        .await
        .unwrap();
    f.ledger
        .get_or_create(&certificate, &course, user, "Ada")
        .await
        .unwrap();

    // Notifications run on a spawned task.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let recipients = f.mailer.sent_to();
    assert_eq!(recipients, vec!["grace.hopper@example.edu".to_string()]);
}

#[tokio::test]
async fn extra_addresses_are_notified() {
    let f = fixture();
    let course = sample_course();
    let mut certificate = sample_certificate(course.id);
    certificate.email_others = Some("dean@example.edu, registrar@example.edu".to_string());

    f.ledger
        .get_or_create(&certificate, &course, Uuid::new_v4(), "Ada")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let recipients = f.mailer.sent_to();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.contains(&"dean@example.edu".to_string()));
    assert!(recipients.contains(&"registrar@example.edu".to_string()));
}

#[tokio::test]
async fn report_excludes_managers() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);

    let manager = user_ref("Grace", "Hopper");
    let manager_id = manager.id;
    f.identity.grant(CAP_MANAGE, manager);

    let student = Uuid::new_v4();
    f.identity.add_user(student, "Ada", "Lovelace");

    f.ledger
        .get_or_create(&certificate, &course, student, "Ada Lovelace")
        .await
        .unwrap();
    f.ledger
        .get_or_create(&certificate, &course, manager_id, "Grace Hopper")
        .await
        .unwrap();

    let filter = ListFilter {
        per_page: 50,
        ..Default::default()
    };
    let rows = f
        .ledger
        .list_issues(certificate.id, course.id, &filter)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue.user_id, student);
    assert_eq!(rows[0].user_name, "Ada Lovelace");
}

#[tokio::test]
async fn empty_group_yields_empty_report() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);
    let group = Uuid::new_v4();
    f.identity.add_group(group, vec![]);

    f.ledger
        .get_or_create(&certificate, &course, Uuid::new_v4(), "Ada")
        .await
        .unwrap();

    let filter = ListFilter {
        group_id: Some(group),
        per_page: 50,
        ..Default::default()
    };
    let rows = f
        .ledger
        .list_issues(certificate.id, course.id, &filter)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn group_scope_restricts_the_report() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);

    let in_group = Uuid::new_v4();
    let outside = Uuid::new_v4();
    let group = Uuid::new_v4();
    f.identity.add_group(group, vec![in_group]);

    f.ledger
        .get_or_create(&certificate, &course, in_group, "In Group")
        .await
        .unwrap();
    f.ledger
        .get_or_create(&certificate, &course, outside, "Outside")
        .await
        .unwrap();

    let filter = ListFilter {
        group_id: Some(group),
        per_page: 50,
        ..Default::default()
    };
    let rows = f
        .ledger
        .list_issues(certificate.id, course.id, &filter)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue.user_id, in_group);
}

#[tokio::test]
async fn pagination_and_sorting() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);

    for i in 0..5 {
        f.ledger
            .get_or_create(&certificate, &course, Uuid::new_v4(), &format!("User {}", i))
            .await
            .unwrap();
    }

    let filter = ListFilter {
        sort: IssueSort::Code,
        page: 0,
        per_page: 3,
        ..Default::default()
    };
    let first_page = f
        .ledger
        .list_issues(certificate.id, course.id, &filter)
        .await
        .unwrap();
    assert_eq!(first_page.len(), 3);
    let codes: Vec<&str> = first_page.iter().map(|r| r.issue.code.as_str()).collect();
    let mut sorted = codes.clone();
    sorted.sort_unstable();
    assert_eq!(codes, sorted);

    let filter = ListFilter {
        sort: IssueSort::Code,
        page: 1,
        per_page: 3,
        ..Default::default()
    };
    let second_page = f
        .ledger
        .list_issues(certificate.id, course.id, &filter)
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);
}

#[tokio::test]
async fn deleting_a_certificate_returns_issue_ids() {
    let f = fixture();
    let course = sample_course();
    let certificate = sample_certificate(course.id);

    let issue = f
        .ledger
        .get_or_create(&certificate, &course, Uuid::new_v4(), "Ada")
        .await
        .unwrap();

    let removed = f.ledger.delete_for_certificate(certificate.id).await.unwrap();
    assert_eq!(removed, vec![issue.id]);
    assert_eq!(f.store.record_count(), 0);
}
