//! HTTP handlers for certificate management, viewing and reporting.

use actix_web::{
    web::{self, Json, Path, Query},
    HttpRequest, HttpResponse, Responder,
};
use log::{error, info};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::models::{
    CertificateDefinition, Course, CreateCertificateRequest, UpdateCertificateRequest,
};
use crate::assets::resolve_images;
use crate::auth::{validate_request_token, Claims};
use crate::db::AppState;
use crate::error::CertificateError;
use crate::grading::GradingService;
use crate::issue::ledger::ListFilter;
use crate::issue::IssueSort;
use crate::render::{Orientation, RenderJob};
use crate::ErrorResponse;

/// Load a definition together with its host course or fail with 404.
async fn load_certificate(
    data: &AppState,
    id: Uuid,
) -> Result<(CertificateDefinition, Course), CertificateError> {
    let definition = data
        .get_certificate(id)
        .await?
        .ok_or_else(|| CertificateError::NotFound(format!("certificate {} not found", id)))?;
    let course = data.get_course(definition.course_id).await?.ok_or_else(|| {
        CertificateError::NotFound(format!("course {} not found", definition.course_id))
    })?;
    Ok((definition, course))
}

fn require_manager(claims: &Claims) -> Result<(), CertificateError> {
    if claims.can_manage() {
        Ok(())
    } else {
        Err(CertificateError::PermissionDenied(
            "certificate management capability required".to_string(),
        ))
    }
}

/// Required-engagement gate: the user's recorded course time must meet the
/// definition's minimum. Managers preview without meeting it. A failed time
/// lookup is an error, not a denial.
pub async fn check_required_time(
    grading: &dyn GradingService,
    definition: &CertificateDefinition,
    course_id: Uuid,
    claims: &Claims,
) -> Result<(), CertificateError> {
    if definition.required_minutes <= 0 || claims.can_manage() {
        return Ok(());
    }
    let spent = grading
        .course_time_seconds(course_id, claims.sub)
        .await
        .map_err(CertificateError::Storage)?;
    let required = i64::from(definition.required_minutes) * 60;
    if spent < required {
        return Err(CertificateError::PermissionDenied(format!(
            "you must spend at least {} minutes in the course before receiving this certificate",
            definition.required_minutes
        )));
    }
    Ok(())
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    post,
    path = "/certificates",
    request_body = CreateCertificateRequest,
    responses(
        (status = 201, description = "Certificate created", body = CertificateDefinition),
        (status = 400, description = "Invalid definition", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not a manager", body = ErrorResponse)
    )
)]
pub async fn create_certificate(
    req: HttpRequest,
    body: Json<CreateCertificateRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    require_manager(&claims)?;

    let body = body.into_inner();
    body.validate(&data.templates.ids())
        .map_err(CertificateError::Validation)?;

    if data.get_course(body.course_id).await.map_err(CertificateError::from)?.is_none() {
        return Err(
            CertificateError::NotFound(format!("course {} not found", body.course_id)).into(),
        );
    }

    let definition = data
        .insert_certificate(&body)
        .await
        .map_err(CertificateError::from)?;
    info!(
        "certificate '{}' created for course {} by {}",
        definition.name, definition.course_id, claims.sub
    );
    Ok(HttpResponse::Created().json(definition))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/certificates/{id}",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate definition", body = CertificateDefinition),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_certificate(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let _claims = validate_request_token(&req)?;
    let (definition, _) = load_certificate(&data, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(definition))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/courses/{course_id}/certificates",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Certificates of the course", body = Vec<CertificateDefinition>)
    )
)]
pub async fn list_certificates(
    req: HttpRequest,
    course_id: Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let _claims = validate_request_token(&req)?;
    let certificates = data
        .list_certificates_for_course(course_id.into_inner())
        .await
        .map_err(CertificateError::from)?;
    Ok(HttpResponse::Ok().json(certificates))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    patch,
    path = "/certificates/{id}",
    request_body = UpdateCertificateRequest,
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Updated definition", body = CertificateDefinition),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 403, description = "Not a manager", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn update_certificate(
    req: HttpRequest,
    id: Path<Uuid>,
    body: Json<UpdateCertificateRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    require_manager(&claims)?;
    let id = id.into_inner();
    let body = body.into_inner();

    body.validate(&data.templates.ids())
        .map_err(CertificateError::Validation)?;

    let updated = data
        .update_certificate(id, &body)
        .await
        .map_err(CertificateError::from)?
        .ok_or_else(|| CertificateError::NotFound(format!("certificate {} not found", id)))?;
    info!("certificate {} updated by {}", id, claims.sub);
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    delete,
    path = "/certificates/{id}",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 204, description = "Certificate and its issuances deleted"),
        (status = 403, description = "Not a manager", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_certificate(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    require_manager(&claims)?;
    let id = id.into_inner();

    // Issuances and their archived documents go with the definition.
    let issue_ids = data.ledger.delete_for_certificate(id).await?;
    for issue_id in &issue_ids {
        if let Err(e) = data.storage.delete_document(*issue_id).await {
            error!("failed to delete stored document for {}: {}", issue_id, e);
        }
    }

    let deleted = data
        .delete_certificate(id)
        .await
        .map_err(CertificateError::from)?;
    if !deleted {
        return Err(CertificateError::NotFound(format!("certificate {} not found", id)).into());
    }
    info!(
        "certificate {} deleted by {} ({} issuances removed)",
        id,
        claims.sub,
        issue_ids.len()
    );
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/certificates/{id}/view",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "The rendered PDF", content_type = "application/pdf"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "No view capability or time requirement unmet", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn view_certificate(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    let (definition, course) = load_certificate(&data, id.into_inner()).await?;

    if !claims.can_view() {
        return Err(CertificateError::PermissionDenied(
            "certificate view capability required".to_string(),
        )
        .into());
    }

    check_required_time(data.grading.as_ref(), &definition, course.id, &claims).await?;

    let issue = data
        .ledger
        .get_or_create(&definition, &course, claims.sub, &claims.full_name)
        .await?;

    let content = data
        .resolver
        .resolve(&definition, &issue, claims.sub, &claims.full_name, &course)
        .await;

    let orientation = Orientation::parse(&definition.orientation).ok_or_else(|| {
        CertificateError::Validation(format!(
            "certificate has invalid orientation '{}'",
            definition.orientation
        ))
    })?;

    let template = data
        .templates
        .get(&definition.template)
        .map_err(CertificateError::from)?;

    let images = {
        let catalog = data.catalog.clone();
        let definition = definition.clone();
        web::block(move || resolve_images(&catalog, &definition))
            .await
            .map_err(|e| CertificateError::Storage(e.to_string()))?
    };

    let job = RenderJob {
        definition: &definition,
        content: &content,
        images: &images,
        orientation,
    };
    let document = data
        .engine
        .render(template, &job, &course.short_name)
        .await
        .map_err(CertificateError::from)?;

    Ok(data
        .coordinator
        .deliver(
            issue.id,
            definition.delivery_mode(),
            definition.save_copy,
            &claims.email,
            document,
        )
        .await)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IssueListParams {
    /// Restrict the report to members of this group.
    pub group_id: Option<Uuid>,
    /// One of `created_asc`, `created_desc`, `code`.
    pub sort: Option<String>,
    #[serde(default)]
    pub page: i64,
    pub per_page: Option<i64>,
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/certificates/{id}/issues",
    params(("id" = Uuid, Path, description = "Certificate id"), IssueListParams),
    responses(
        (status = 200, description = "Issuances awarded for this certificate", body = Vec<crate::issue::IssueReportRow>),
        (status = 400, description = "Invalid sort key", body = ErrorResponse),
        (status = 403, description = "Not a manager", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn list_issues(
    req: HttpRequest,
    id: Path<Uuid>,
    params: Query<IssueListParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    require_manager(&claims)?;
    let (definition, course) = load_certificate(&data, id.into_inner()).await?;

    let sort = match &params.sort {
        Some(key) => IssueSort::parse(key)
            .ok_or_else(|| CertificateError::Validation(format!("unknown sort key '{}'", key)))?,
        None => IssueSort::default(),
    };

    let filter = ListFilter {
        group_id: params.group_id,
        sort,
        page: params.page,
        per_page: params.per_page.unwrap_or(50),
    };
    let rows = data
        .ledger
        .list_issues(definition.id, course.id, &filter)
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/certificates/{id}/issues/mine",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "The caller's issuances for this certificate", body = Vec<crate::issue::IssuanceRecord>),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn list_my_issues(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    let (definition, _) = load_certificate(&data, id.into_inner()).await?;
    let issues = data.ledger.issues_for_user(definition.id, claims.sub).await?;
    Ok(HttpResponse::Ok().json(issues))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Available template ids", body = Vec<String>)
    )
)]
pub async fn list_templates(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.templates.ids())
}
