//! Template Engine / Renderer.
//!
//! Certificates are laid out as Typst source with absolute `#place`
//! coordinates and compiled to PDF by the Typst CLI. Each template variant is
//! a fixed single-page layout; the shared frame/image/text source builders
//! live in `common`, the compiler plumbing in `engine`.
//!
//! Source generation is deterministic: the same definition, content and
//! image set always produce byte-identical Typst source, and the document
//! date is pinned so the compiled PDF carries no wall-clock metadata.

pub mod common;
pub mod engine;

mod achievement;
mod regional;

pub use achievement::AchievementTemplate;
pub use engine::TypstEngine;
pub use regional::RegionalTemplate;

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::certificate::models::CertificateDefinition;
use crate::content::ResolvedContent;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("failed to create compile directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to stage image '{0}': {1}")]
    CopyImage(String, #[source] std::io::Error),
    #[error("failed to write Typst source: {0}")]
    WriteSource(#[source] std::io::Error),
    #[error("Typst CLI execution failed: {0}")]
    CompilerIo(#[source] std::io::Error),
    #[error("Typst CLI exited with status {0}")]
    CompilerExit(i32),
    #[error("failed to read compiled PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
}

/// Result of a successful render.
#[derive(Debug)]
pub struct RenderedDocument {
    pub filename: String,
    pub pdf: Vec<u8>,
}

/// Page orientation. All layout constants differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "L" => Some(Orientation::Landscape),
            "P" => Some(Orientation::Portrait),
            _ => None,
        }
    }
}

/// Absolute layout constants for one template in one orientation, in mm.
/// These are design values, never computed.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub page_width: f64,
    pub page_height: f64,
    /// Left edge and top baseline of the centered text column.
    pub text_x: f64,
    pub text_y: f64,
    pub seal_x: f64,
    pub seal_y: f64,
    pub signature_x: f64,
    pub signature_y: f64,
    pub custom_x: f64,
    pub custom_y: f64,
    pub watermark_x: f64,
    pub watermark_y: f64,
    pub watermark_w: f64,
    pub watermark_h: f64,
    pub border_x: f64,
    pub border_y: f64,
    pub border_w: f64,
    pub border_h: f64,
    pub code_y: f64,
}

impl Layout {
    /// Width available to the centered text column.
    pub fn text_width(&self) -> f64 {
        self.page_width - 2.0 * self.text_x
    }
}

/// An image staged for compilation: where it lives on disk and the name it
/// gets inside the compile directory.
#[derive(Debug, Clone)]
pub struct StagedImage {
    pub staged_name: String,
    pub path: PathBuf,
}

/// Images resolved for each slot, in draw order (system first, uploaded on
/// top). Empty vectors mean nothing is drawn for that slot.
#[derive(Debug, Clone, Default)]
pub struct SlotImages {
    pub border: Vec<StagedImage>,
    pub watermark: Vec<StagedImage>,
    pub seal: Vec<StagedImage>,
    pub signature: Vec<StagedImage>,
}

impl SlotImages {
    pub fn all(&self) -> impl Iterator<Item = &StagedImage> {
        self.border
            .iter()
            .chain(&self.watermark)
            .chain(&self.seal)
            .chain(&self.signature)
    }
}

/// One render request, bundled for the template.
pub struct RenderJob<'a> {
    pub definition: &'a CertificateDefinition,
    pub content: &'a ResolvedContent,
    pub images: &'a SlotImages,
    pub orientation: Orientation,
}

/// A fixed visual layout selected by id.
pub trait Template: Send + Sync {
    fn id(&self) -> &'static str;

    fn layout(&self, orientation: Orientation) -> Layout;

    /// Full Typst source for one page. Must be deterministic in the job.
    fn source(&self, job: &RenderJob) -> String;
}

/// Maps template identifiers to implementations; selection is a lookup,
/// never dynamic loading.
pub struct TemplateRegistry {
    templates: HashMap<&'static str, Box<dyn Template>>,
}

impl TemplateRegistry {
    pub fn with_builtin() -> Self {
        let mut templates: HashMap<&'static str, Box<dyn Template>> = HashMap::new();
        for template in [
            Box::new(AchievementTemplate) as Box<dyn Template>,
            Box::new(RegionalTemplate) as Box<dyn Template>,
        ] {
            templates.insert(template.id(), template);
        }
        Self { templates }
    }

    pub fn get(&self, id: &str) -> Result<&dyn Template, RenderError> {
        self.templates
            .get(id)
            .map(|t| t.as_ref())
            .ok_or_else(|| RenderError::UnknownTemplate(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.templates.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
