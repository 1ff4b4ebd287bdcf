//! Delivery of a rendered document back to the requesting user.
//!
//! Persistence and email are side effects of delivery and both are
//! best-effort: the user still gets their document when the archive write or
//! the mail relay fails. Only the streamed response itself is load-bearing.

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::HttpResponse;
use std::sync::Arc;
use uuid::Uuid;

use crate::certificate::models::DeliveryMode;
use crate::mail::{Attachment, MailGateway, Message};
use crate::render::RenderedDocument;
use crate::storage::ObjectStorage;

pub struct DeliveryCoordinator {
    storage: Arc<dyn ObjectStorage>,
    mailer: Arc<dyn MailGateway>,
}

impl DeliveryCoordinator {
    pub fn new(storage: Arc<dyn ObjectStorage>, mailer: Arc<dyn MailGateway>) -> Self {
        Self { storage, mailer }
    }

    /// Persist, mail and stream a rendered document according to the
    /// certificate's configuration.
    pub async fn deliver(
        &self,
        issue_id: Uuid,
        mode: DeliveryMode,
        save_copy: bool,
        recipient_email: &str,
        document: RenderedDocument,
    ) -> HttpResponse {
        if save_copy {
            if let Err(e) = self
                .storage
                .put_document(issue_id, &document.filename, &document.pdf)
                .await
            {
                log::warn!("archive write for issuance {} failed: {}", issue_id, e);
            }
        }

        if mode == DeliveryMode::Email {
            self.send_document(recipient_email, &document).await;
        }

        let disposition_type = match mode {
            DeliveryMode::Download => DispositionType::Attachment,
            DeliveryMode::View | DeliveryMode::Email => DispositionType::Inline,
        };

        HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header(ContentDisposition {
                disposition: disposition_type,
                parameters: vec![DispositionParam::Filename(document.filename.clone())],
            })
            .body(document.pdf)
    }

    async fn send_document(&self, recipient_email: &str, document: &RenderedDocument) {
        if recipient_email.is_empty() {
            log::warn!("email delivery requested but recipient has no address");
            return;
        }
        let message = Message {
            to: recipient_email.to_string(),
            subject: "Your certificate".to_string(),
            text: "Your certificate is attached.".to_string(),
            html: "<p>Your certificate is attached.</p>".to_string(),
            attachment: Some(Attachment::pdf(&document.filename, &document.pdf)),
        };
        if let Err(e) = self.mailer.send(message).await {
            log::warn!("certificate email to {} failed: {}", recipient_email, e);
        }
    }
}
