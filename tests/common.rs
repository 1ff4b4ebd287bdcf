//! Shared test doubles: an in-memory issuance store with the same conflict
//! semantics as Postgres, plus configurable identity, grading and mail mocks.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use certificate_server::certificate::models::{
    CertificateDefinition, Course, CreateCertificateRequest,
};
use certificate_server::grading::{GradeData, GradingService, OutcomeData};
use certificate_server::identity::{IdentityService, UserRef};
use certificate_server::issue::{IssuanceRecord, IssueQuery, IssueSort, IssueStore, StoreError};
use certificate_server::mail::{MailGateway, Message};

/// In-memory issue store enforcing the same unique constraints as the
/// Postgres schema. `inject_before_insert` simulates a concurrent writer
/// slipping in between the ledger's read and write; `force_conflicts`
/// makes the next n inserts fail as if the code index had fired.
#[derive(Default)]
pub struct MemoryIssueStore {
    records: RwLock<Vec<IssuanceRecord>>,
    pub inject_before_insert: RwLock<Option<IssuanceRecord>>,
    pub force_conflicts: RwLock<usize>,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    fn violates_unique(&self, record: &IssuanceRecord) -> bool {
        self.records.read().iter().any(|r| {
            (r.certificate_id == record.certificate_id && r.user_id == record.user_id)
                || r.code == record.code
        })
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn find(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<IssuanceRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.certificate_id == certificate_id && r.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, record: &IssuanceRecord) -> Result<(), StoreError> {
        {
            let mut forced = self.force_conflicts.write();
            if *forced > 0 {
                *forced -= 1;
                return Err(StoreError::Conflict);
            }
        }
        if let Some(raced) = self.inject_before_insert.write().take() {
            if !self.violates_unique(&raced) {
                self.records.write().push(raced);
            }
        }
        if self.violates_unique(record) {
            return Err(StoreError::Conflict);
        }
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.records.read().iter().any(|r| r.code == code))
    }

    async fn list_for_certificate(
        &self,
        certificate_id: Uuid,
        query: &IssueQuery,
    ) -> Result<Vec<IssuanceRecord>, StoreError> {
        let mut rows: Vec<IssuanceRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.certificate_id == certificate_id)
            .filter(|r| !query.exclude_users.contains(&r.user_id))
            .filter(|r| match &query.include_users {
                Some(users) => users.contains(&r.user_id),
                None => true,
            })
            .cloned()
            .collect();
        match query.sort {
            IssueSort::CreatedAsc => rows.sort_by_key(|r| r.created_at),
            IssueSort::CreatedDesc => {
                rows.sort_by_key(|r| r.created_at);
                rows.reverse();
            }
            IssueSort::Code => rows.sort_by(|a, b| a.code.cmp(&b.code)),
        }
        Ok(rows
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn list_for_user(
        &self,
        certificate_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<IssuanceRecord>, StoreError> {
        let mut rows: Vec<IssuanceRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.certificate_id == certificate_id && r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn delete_for_certificate(&self, certificate_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let mut records = self.records.write();
        let removed: Vec<Uuid> = records
            .iter()
            .filter(|r| r.certificate_id == certificate_id)
            .map(|r| r.id)
            .collect();
        records.retain(|r| r.certificate_id != certificate_id);
        Ok(removed)
    }
}

/// Identity mock with explicit capability and group membership tables.
#[derive(Default)]
pub struct MockIdentityService {
    pub names: RwLock<HashMap<Uuid, String>>,
    /// capability -> holders
    pub capabilities: RwLock<HashMap<String, Vec<UserRef>>>,
    pub groups: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl MockIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: Uuid, first: &str, last: &str) {
        self.names
            .write()
            .insert(id, format!("{} {}", first, last));
    }

    pub fn grant(&self, capability: &str, user: UserRef) {
        self.add_user(user.id, &user.first_name, &user.last_name);
        self.capabilities
            .write()
            .entry(capability.to_string())
            .or_default()
            .push(user);
    }

    pub fn add_group(&self, group_id: Uuid, members: Vec<Uuid>) {
        self.groups.write().insert(group_id, members);
    }
}

#[async_trait]
impl IdentityService for MockIdentityService {
    async fn full_name(&self, user_id: Uuid) -> Result<String, String> {
        Ok(self.names.read().get(&user_id).cloned().unwrap_or_default())
    }

    async fn users_with_capability(
        &self,
        _course_id: Uuid,
        capability: &str,
    ) -> Result<Vec<UserRef>, String> {
        Ok(self
            .capabilities
            .read()
            .get(capability)
            .cloned()
            .unwrap_or_default())
    }

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, String> {
        Ok(self.groups.read().get(&group_id).cloned().unwrap_or_default())
    }
}

/// Grading mock returning fixed values regardless of ids.
#[derive(Default)]
pub struct MockGradingService {
    pub course_grade: Option<GradeData>,
    pub activity_grade: Option<GradeData>,
    pub category_grade: Option<GradeData>,
    pub completion_date: Option<DateTime<Utc>>,
    pub activity_grade_date: Option<DateTime<Utc>>,
    pub outcome: Option<OutcomeData>,
    pub course_seconds: i64,
    /// When set, `course_time_seconds` fails with this message.
    pub course_seconds_error: Option<String>,
}

#[async_trait]
impl GradingService for MockGradingService {
    async fn course_grade(&self, _course_id: Uuid, _user_id: Uuid) -> Option<GradeData> {
        self.course_grade.clone()
    }

    async fn activity_grade(&self, _item_id: i64, _user_id: Uuid) -> Option<GradeData> {
        self.activity_grade.clone()
    }

    async fn category_grade(&self, _category_id: i64, _user_id: Uuid) -> Option<GradeData> {
        self.category_grade.clone()
    }

    async fn completion_date(&self, _course_id: Uuid, _user_id: Uuid) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    async fn activity_grade_date(&self, _item_id: i64, _user_id: Uuid) -> Option<DateTime<Utc>> {
        self.activity_grade_date
    }

    async fn outcome(&self, _outcome_id: i64, _user_id: Uuid) -> Option<OutcomeData> {
        self.outcome.clone()
    }

    async fn course_time_seconds(&self, _course_id: Uuid, _user_id: Uuid) -> Result<i64, String> {
        match &self.course_seconds_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.course_seconds),
        }
    }
}

/// Mail gateway that records every message instead of sending.
#[derive(Default)]
pub struct RecordingMailGateway {
    pub sent: RwLock<Vec<Message>>,
}

impl RecordingMailGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent.read().iter().map(|m| m.to.clone()).collect()
    }
}

#[async_trait]
impl MailGateway for RecordingMailGateway {
    async fn send(&self, message: Message) -> Result<(), String> {
        self.sent.write().push(message);
        Ok(())
    }
}

/// Mail gateway that always fails, for best-effort delivery tests.
pub struct FailingMailGateway;

#[async_trait]
impl MailGateway for FailingMailGateway {
    async fn send(&self, _message: Message) -> Result<(), String> {
        Err("relay unavailable".to_string())
    }
}

pub fn user_ref(first: &str, last: &str) -> UserRef {
    UserRef {
        id: Uuid::new_v4(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!(
            "{}.{}@example.edu",
            first.to_lowercase(),
            last.to_lowercase()
        ),
    }
}

pub fn sample_course() -> Course {
    Course {
        id: Uuid::new_v4(),
        short_name: "RUST101".to_string(),
        full_name: "Introduction to Systems Programming".to_string(),
    }
}

/// A definition with quiet defaults; tests override what they exercise.
pub fn sample_certificate(course_id: Uuid) -> CertificateDefinition {
    let req: CreateCertificateRequest = serde_json::from_value(serde_json::json!({
        "course_id": course_id,
        "name": "Completion Certificate",
        "template": "achievement",
        "orientation": "L"
    }))
    .unwrap();
    CertificateDefinition {
        id: Uuid::new_v4(),
        course_id,
        name: req.name,
        intro: None,
        template: req.template,
        orientation: req.orientation,
        border_style: None,
        border_color: 0,
        watermark: None,
        signature: None,
        seal: None,
        delivery: 0,
        save_copy: false,
        email_teachers: false,
        email_others: None,
        required_minutes: 0,
        date_source: 0,
        date_format: 1,
        grade_source: 0,
        grade_format: 1,
        outcome_source: 0,
        print_hours: None,
        print_teacher: false,
        print_number: true,
        custom_text: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
