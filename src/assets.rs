//! Image assets for the renderer.
//!
//! Each image slot (border, watermark, seal, signature) resolves a configured
//! name against two directories: the system set shipped with the deployment
//! and the per-site upload directory. When both hold a file of the same name
//! the system one is drawn first and the uploaded one on top.

use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::TryStreamExt;
use log::{error, info};
use sanitize_filename::sanitize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use crate::auth::validate_request_token;
use crate::certificate::models::CertificateDefinition;
use crate::db::AppState;
use crate::render::{SlotImages, StagedImage};
use crate::ErrorResponse;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// The four image slots of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Border,
    Watermark,
    Seal,
    Signature,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 4] = [
        ImageSlot::Border,
        ImageSlot::Watermark,
        ImageSlot::Seal,
        ImageSlot::Signature,
    ];

    /// Subdirectory name under both asset roots.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageSlot::Border => "borders",
            ImageSlot::Watermark => "watermarks",
            ImageSlot::Seal => "seals",
            ImageSlot::Signature => "signatures",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "borders" => Some(ImageSlot::Border),
            "watermarks" => Some(ImageSlot::Watermark),
            "seals" => Some(ImageSlot::Seal),
            "signatures" => Some(ImageSlot::Signature),
            _ => None,
        }
    }
}

/// Filesystem-backed image lookup across the system and upload roots.
pub struct AssetCatalog {
    system_root: PathBuf,
    upload_root: PathBuf,
}

impl AssetCatalog {
    pub fn new(system_root: PathBuf, upload_root: PathBuf) -> Self {
        Self {
            system_root,
            upload_root,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            PathBuf::from(std::env::var("CERT_ASSET_DIR").unwrap_or_else(|_| "assets".to_string())),
            PathBuf::from(
                std::env::var("CERT_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
        )
    }

    pub fn upload_dir(&self, slot: ImageSlot) -> PathBuf {
        self.upload_root.join(slot.dir_name())
    }

    /// Existing files for a configured image name, system first. An absent
    /// name or missing files resolve to an empty list; renders degrade
    /// rather than fail.
    pub fn find_image(&self, slot: ImageSlot, name: &str) -> Vec<PathBuf> {
        // Stored names may predate validation; a name that is not a bare
        // file name never leaves the asset roots.
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            log::warn!("rejecting image name with path components: '{}'", name);
            return Vec::new();
        }
        let mut found = Vec::new();
        for root in [&self.system_root, &self.upload_root] {
            let path = root.join(slot.dir_name()).join(name);
            if is_image(&path) && path.is_file() {
                found.push(path);
            }
        }
        found
    }

    /// Image names available for a slot across both roots, deduplicated and
    /// sorted for the configuration UI.
    pub fn list_images(&self, slot: ImageSlot) -> Vec<String> {
        let mut names = Vec::new();
        for root in [&self.system_root, &self.upload_root] {
            let dir = root.join(slot.dir_name());
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if is_image(&path) && path.is_file() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Resolve every configured image of a definition to staged files. Staged
/// names carry the slot and source index so two same-named files never
/// collide inside the compile directory.
pub fn resolve_images(catalog: &AssetCatalog, definition: &CertificateDefinition) -> SlotImages {
    let mut images = SlotImages::default();
    for slot in ImageSlot::ALL {
        let configured = match slot {
            ImageSlot::Border => &definition.border_style,
            ImageSlot::Watermark => &definition.watermark,
            ImageSlot::Seal => &definition.seal,
            ImageSlot::Signature => &definition.signature,
        };
        let Some(name) = configured.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };
        let staged: Vec<StagedImage> = catalog
            .find_image(slot, name)
            .into_iter()
            .enumerate()
            .map(|(idx, path)| StagedImage {
                staged_name: format!("{}-{}-{}", slot.dir_name(), idx, name),
                path,
            })
            .collect();
        match slot {
            ImageSlot::Border => images.border = staged,
            ImageSlot::Watermark => images.watermark = staged,
            ImageSlot::Seal => images.seal = staged,
            ImageSlot::Signature => images.signature = staged,
        }
    }
    images
}

#[derive(Serialize, ToSchema)]
pub struct ImageListResponse {
    pub slot: String,
    pub images: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadImageResponse {
    pub slot: String,
    pub filename: String,
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Images",
    get,
    path = "/images/{slot}",
    params(
        ("slot" = String, Path, description = "Image slot: borders, watermarks, seals or signatures")
    ),
    responses(
        (status = 200, description = "Available image names for the slot", body = ImageListResponse),
        (status = 404, description = "Unknown slot", body = ErrorResponse)
    )
)]
pub async fn list_images(slot: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let slot_name = slot.into_inner();
    let Some(slot) = ImageSlot::parse(&slot_name) else {
        return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "unknown image slot '{}'",
            slot_name
        )));
    };
    let catalog = data.catalog.clone();
    let images = web::block(move || catalog.list_images(slot))
        .await
        .unwrap_or_default();
    HttpResponse::Ok().json(ImageListResponse {
        slot: slot_name,
        images,
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Images",
    post,
    path = "/images/{slot}",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image uploaded", body = UploadImageResponse),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not a manager", body = ErrorResponse),
        (status = 404, description = "Unknown slot", body = ErrorResponse)
    ),
    params(
        ("slot" = String, Path, description = "Image slot: borders, watermarks, seals or signatures")
    )
)]
pub async fn upload_image(
    req: HttpRequest,
    slot: web::Path<String>,
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = validate_request_token(&req)?;
    if !claims.can_manage() {
        return Err(crate::error::CertificateError::PermissionDenied(
            "certificate management capability required".to_string(),
        )
        .into());
    }

    let slot_name = slot.into_inner();
    let Some(slot) = ImageSlot::parse(&slot_name) else {
        return Ok(HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "unknown image slot '{}'",
            slot_name
        ))));
    };

    let response = match read_upload(payload).await {
        Ok((filename, bytes)) => {
            let dir = data.catalog.upload_dir(slot);
            let path = dir.join(&filename);
            let write = web::block(move || {
                std::fs::create_dir_all(&dir)?;
                std::fs::write(&path, &bytes)
            })
            .await;
            match write {
                Ok(Ok(())) => {
                    info!("uploaded {} image '{}'", slot.dir_name(), filename);
                    HttpResponse::Created().json(UploadImageResponse {
                        slot: slot_name,
                        filename,
                    })
                }
                Ok(Err(e)) => {
                    error!("failed to store uploaded image: {}", e);
                    HttpResponse::InternalServerError()
                        .json(ErrorResponse::internal_error("Failed to store image"))
                }
                Err(e) => {
                    error!("upload write task failed: {}", e);
                    HttpResponse::InternalServerError()
                        .json(ErrorResponse::internal_error("Failed to store image"))
                }
            }
        }
        Err(e) => {
            error!("image upload rejected: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e))
        }
    };
    Ok(response)
}

/// Pull the first `file` field out of the multipart payload.
async fn read_upload(mut payload: Multipart) -> Result<(String, Vec<u8>), String> {
    while let Some(mut field) = payload.try_next().await.map_err(|e| e.to_string())? {
        let content_disposition = field
            .content_disposition()
            .ok_or("Content-Disposition not set")?;
        if content_disposition.get_name() != Some("file") {
            continue;
        }
        let raw_name = content_disposition
            .get_filename()
            .ok_or_else(|| "No filename".to_string())?;
        let filename = sanitize(raw_name);

        let guessed = mime_guess::from_path(&filename).first_or_octet_stream();
        if guessed.type_() != mime_guess::mime::IMAGE {
            return Err(format!("'{}' is not an image", filename));
        }
        if !is_image(Path::new(&filename)) {
            return Err("only png and jpeg images are accepted".to_string());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err("uploaded file is empty".to_string());
        }
        return Ok((filename, bytes));
    }
    Err("No file was uploaded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parsing() {
        assert_eq!(ImageSlot::parse("seals"), Some(ImageSlot::Seal));
        assert_eq!(ImageSlot::parse("seal"), None);
        for slot in ImageSlot::ALL {
            assert_eq!(ImageSlot::parse(slot.dir_name()), Some(slot));
        }
    }

    #[test]
    fn test_is_image_by_extension() {
        assert!(is_image(Path::new("crest.PNG")));
        assert!(is_image(Path::new("crest.jpeg")));
        assert!(!is_image(Path::new("crest.pdf")));
        assert!(!is_image(Path::new("crest")));
    }
}
