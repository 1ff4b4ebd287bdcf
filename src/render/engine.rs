//! Typst compilation plumbing.
//!
//! The engine stages the job's images into a temporary directory, writes the
//! template's source next to them and invokes the Typst CLI. Compilation is
//! synchronous process work, so callers on the async path run it through
//! `render` which moves it onto the blocking pool.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

use super::common::document_filename;
use super::{RenderError, RenderJob, RenderedDocument, SlotImages, Template};

const SOURCE_FILENAME: &str = "certificate.typ";
const OUTPUT_FILENAME: &str = "certificate.pdf";

/// Stateless compiler front-end. The binary name comes from `TYPST_BIN` so
/// deployments can pin a specific build.
pub struct TypstEngine {
    binary: String,
}

impl TypstEngine {
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("TYPST_BIN").unwrap_or_else(|_| "typst".to_string()),
        }
    }

    /// Render one certificate page to PDF.
    pub async fn render(
        &self,
        template: &dyn Template,
        job: &RenderJob<'_>,
        course_short_name: &str,
    ) -> Result<RenderedDocument, RenderError> {
        let source = template.source(job);
        let filename = document_filename(course_short_name, &job.definition.name);
        let binary = self.binary.clone();
        let images = job.images.clone();

        let pdf = tokio::task::spawn_blocking(move || compile(&binary, &source, &images))
            .await
            .map_err(|e| {
                RenderError::CompilerIo(std::io::Error::new(std::io::ErrorKind::Other, e))
            })??;

        Ok(RenderedDocument { filename, pdf })
    }
}

fn compile(binary: &str, source: &str, images: &SlotImages) -> Result<Vec<u8>, RenderError> {
    let dir = tempdir().map_err(RenderError::TempDir)?;

    for image in images.all() {
        stage_image(dir.path(), image)?;
    }

    let source_path = dir.path().join(SOURCE_FILENAME);
    fs::write(&source_path, source).map_err(RenderError::WriteSource)?;

    let output_path = dir.path().join(OUTPUT_FILENAME);
    let status = Command::new(binary)
        .arg("compile")
        .arg(&source_path)
        .arg(&output_path)
        .current_dir(dir.path())
        .status()
        .map_err(RenderError::CompilerIo)?;

    if !status.success() {
        return Err(RenderError::CompilerExit(status.code().unwrap_or(-1)));
    }

    fs::read(&output_path).map_err(RenderError::ReadPdf)
}

fn stage_image(dir: &Path, image: &super::StagedImage) -> Result<(), RenderError> {
    fs::copy(&image.path, dir.join(&image.staged_name))
        .map(|_| ())
        .map_err(|e| RenderError::CopyImage(image.staged_name.clone(), e))
}
