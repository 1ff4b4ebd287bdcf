use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod assets;
pub mod auth;
pub mod certificate;
pub mod content;
pub mod db;
pub mod delivery;
pub mod error;
pub mod grading;
pub mod identity;
pub mod issue;
pub mod mail;
pub mod render;
pub mod storage;

pub use crate::db::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::certificate::handlers::create_certificate,
            crate::certificate::handlers::get_certificate,
            crate::certificate::handlers::list_certificates,
            crate::certificate::handlers::update_certificate,
            crate::certificate::handlers::delete_certificate,
            crate::certificate::handlers::view_certificate,
            crate::certificate::handlers::list_issues,
            crate::certificate::handlers::list_my_issues,
            crate::certificate::handlers::list_templates,
            crate::assets::list_images,
            crate::assets::upload_image
        ),
        components(
            schemas(
                certificate::models::CertificateDefinition,
                certificate::models::CreateCertificateRequest,
                certificate::models::UpdateCertificateRequest,
                certificate::models::Course,
                issue::IssuanceRecord,
                issue::IssueReportRow,
                assets::ImageListResponse,
                assets::UploadImageResponse,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Certificates", description = "Certificate definition, viewing and report endpoints."),
            (name = "Certificate Images", description = "Border, watermark, seal and signature image endpoints.")
        ),
        servers(
            (url = "http://127.0.0.1:8080", description = "Localhost server")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok();
    let app_state = match AppState::new().await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check your DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("certificate_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
                web::scope("/api")
                    .service(
                        web::resource("/certificates")
                            .route(web::post().to(certificate::handlers::create_certificate)),
                    )
                    .service(
                        web::resource("/certificates/{id}")
                            .route(web::get().to(certificate::handlers::get_certificate))
                            .route(web::patch().to(certificate::handlers::update_certificate))
                            .route(web::delete().to(certificate::handlers::delete_certificate)),
                    )
                    .service(
                        web::resource("/certificates/{id}/view")
                            .route(web::get().to(certificate::handlers::view_certificate)),
                    )
                    .service(
                        web::resource("/certificates/{id}/issues")
                            .route(web::get().to(certificate::handlers::list_issues)),
                    )
                    .service(
                        web::resource("/certificates/{id}/issues/mine")
                            .route(web::get().to(certificate::handlers::list_my_issues)),
                    )
                    .service(
                        web::resource("/courses/{course_id}/certificates")
                            .route(web::get().to(certificate::handlers::list_certificates)),
                    )
                    .service(
                        web::resource("/templates")
                            .route(web::get().to(certificate::handlers::list_templates)),
                    )
                    .service(
                        web::resource("/images/{slot}")
                            .route(web::get().to(assets::list_images))
                            .route(web::post().to(assets::upload_image)),
                    ),
            )
            .service(
                actix_files::Files::new(
                    "/static/images",
                    std::env::var("CERT_ASSET_DIR").unwrap_or_else(|_| "assets".to_string()),
                )
                .use_etag(true),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .max_connections(25000)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
