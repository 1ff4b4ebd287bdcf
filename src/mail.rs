//! Mail gateway and award notifications.
//!
//! Mail is strictly best-effort: a failed send is logged and swallowed, the
//! primary request never fails because of it. Delivery goes through an HTTP
//! relay endpoint; when none is configured a logging no-op takes its place.

use async_trait::async_trait;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use crate::certificate::models::{CertificateDefinition, Course};
use crate::identity::{IdentityService, CAP_MANAGE};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded payload, the shape the relay expects.
    pub data: String,
}

impl Attachment {
    pub fn pdf(filename: &str, bytes: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), String>;
}

/// Posts messages to an HTTP mail relay (`MAIL_GATEWAY_URL`).
pub struct HttpMailGateway {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpMailGateway {
    pub fn from_env(client: reqwest::Client) -> Option<Self> {
        let endpoint = std::env::var("MAIL_GATEWAY_URL").ok()?;
        let token = std::env::var("MAIL_GATEWAY_TOKEN").ok();
        Some(Self {
            endpoint,
            token,
            client,
        })
    }
}

#[async_trait]
impl MailGateway for HttpMailGateway {
    async fn send(&self, message: Message) -> Result<(), String> {
        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("mail relay returned {}", response.status()))
        }
    }
}

/// Stand-in when no relay is configured; logs instead of sending.
pub struct NoopMailGateway;

#[async_trait]
impl MailGateway for NoopMailGateway {
    async fn send(&self, message: Message) -> Result<(), String> {
        log::info!(
            "mail gateway not configured, dropping message to {} ({})",
            message.to,
            message.subject
        );
        Ok(())
    }
}

/// Composes and sends the emails that accompany a fresh issuance.
pub struct Notifier {
    mailer: Arc<dyn MailGateway>,
    identity: Arc<dyn IdentityService>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn MailGateway>, identity: Arc<dyn IdentityService>) -> Self {
        Self { mailer, identity }
    }

    /// Notify course managers and the configured extra addresses that a
    /// certificate has been awarded. Fired exactly once per issuance, only on
    /// the creating path.
    pub async fn notify_awarded(
        &self,
        certificate: &CertificateDefinition,
        course: &Course,
        student_name: &str,
        student_id: uuid::Uuid,
    ) {
        let subject = format!("Awarded: {} -> {}", student_name, certificate.name);
        let text = format!(
            "{} has been awarded the certificate \"{}\" in {}.",
            student_name, certificate.name, course.full_name
        );
        let html = format!("<p>{}</p>", text);

        let mut recipients: Vec<String> = Vec::new();

        if certificate.email_teachers {
            match self
                .identity
                .users_with_capability(course.id, CAP_MANAGE)
                .await
            {
                Ok(teachers) => {
                    recipients.extend(
                        teachers
                            .into_iter()
                            // Never notify the awardee about themselves.
                            .filter(|t| t.id != student_id)
                            .map(|t| t.email),
                    );
                }
                Err(e) => log::warn!("teacher lookup for notification failed: {}", e),
            }
        }

        if let Some(others) = &certificate.email_others {
            recipients.extend(
                others
                    .split(',')
                    .map(str::trim)
                    .filter(|a| is_valid_email(a))
                    .map(str::to_string),
            );
        }

        for to in recipients {
            let message = Message {
                to: to.clone(),
                subject: subject.clone(),
                text: text.clone(),
                html: html.clone(),
                attachment: None,
            };
            if let Err(e) = self.mailer.send(message).await {
                log::warn!("award notification to {} failed: {}", to, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("teacher@example.edu"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn test_attachment_is_base64() {
        let att = Attachment::pdf("cert.pdf", b"%PDF-1.7");
        assert_eq!(att.content_type, "application/pdf");
        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(att.data)
                .unwrap(),
            b"%PDF-1.7"
        );
    }
}
