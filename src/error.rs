//! Request error taxonomy for the certificate service.
//!
//! Only authorization failures and hard not-found conditions surface to the
//! caller. Missing grade/date/outcome data, missing image files, duplicate
//! creation races and email failures are all absorbed by the component that
//! encounters them.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Validation(String),
    /// A concurrent insert won the uniqueness race. Handled internally by the
    /// ledger; it never reaches a handler on the issue path.
    #[error("duplicate issuance for this certificate and user")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("render failed: {0}")]
    Render(#[from] crate::render::RenderError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CertificateError {
    fn error_type(&self) -> &'static str {
        match self {
            CertificateError::NotFound(_) => "NotFound",
            CertificateError::PermissionDenied(_) => "PermissionDenied",
            CertificateError::Validation(_) => "BadRequest",
            CertificateError::Conflict => "Conflict",
            CertificateError::Database(_)
            | CertificateError::Render(_)
            | CertificateError::Storage(_) => "InternalServerError",
        }
    }
}

impl actix_web::ResponseError for CertificateError {
    fn status_code(&self) -> StatusCode {
        match self {
            CertificateError::NotFound(_) => StatusCode::NOT_FOUND,
            CertificateError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            CertificateError::Validation(_) => StatusCode::BAD_REQUEST,
            CertificateError::Conflict => StatusCode::CONFLICT,
            CertificateError::Database(_)
            | CertificateError::Render(_)
            | CertificateError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
        }
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(self.error_type(), &self.to_string()))
    }
}
