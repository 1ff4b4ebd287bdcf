//! Shared Typst source builders: page setup, border frames, image slots and
//! positioned text. Both templates compose their pages from these so the
//! drawing rules stay identical across variants.

use super::{Layout, RenderJob, StagedImage};

/// Frame stroke widths, outer / middle / inner, in mm.
const FRAME_STROKES: [f64; 3] = [1.5, 0.2, 1.0];
/// Inset of each nested frame rectangle from the previous one, in mm.
const FRAME_STEP: f64 = 3.0;

/// Watermarks are drawn washed out to an effective 0.2 alpha: the image at
/// full strength, then a white overlay at 80% opacity on top.
const WATERMARK_OVERLAY: &str = "rgb(255, 255, 255, 80%)";

/// Escape a value for use inside a Typst string literal.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

/// Lowercase-dash form of a name for output filenames.
pub fn sanitize_name(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if ch.is_whitespace() || ch == '-' || ch == '_' || ch == '&' {
            if !last_dash && !result.is_empty() {
                result.push('-');
                last_dash = true;
            }
        }
    }

    let result = result.trim_matches('-').to_string();
    if result.is_empty() {
        fallback.to_string()
    } else {
        result
    }
}

/// Output filename: `<sanitized course short name>_<sanitized name>.pdf`.
pub fn document_filename(course_short_name: &str, certificate_name: &str) -> String {
    format!(
        "{}_{}.pdf",
        sanitize_name(course_short_name, "course"),
        sanitize_name(certificate_name, "certificate")
    )
}

/// Page and document setup. The document date is pinned to `none` so
/// repeated compiles of identical source yield identical bytes.
pub fn page_setup(layout: &Layout, font: &str) -> String {
    format!(
        "#set page(width: {:.1}mm, height: {:.1}mm, margin: 0mm)\n\
         #set document(date: none)\n\
         #set text(font: \"{}\")\n",
        layout.page_width, layout.page_height, font
    )
}

/// RGB triple for a configured border color, `None` when no frame is drawn.
pub fn border_rgb(border_color: i32) -> Option<(u8, u8, u8)> {
    match border_color {
        1 => Some((0, 0, 0)),      // black
        2 => Some((153, 102, 51)), // brown
        3 => Some((0, 51, 204)),   // blue
        4 => Some((0, 180, 0)),    // green
        _ => None,
    }
}

/// Three concentric frame rectangles in the configured color. Emits nothing
/// when no border color is configured.
pub fn frame_source(layout: &Layout, border_color: i32) -> String {
    let Some((r, g, b)) = border_rgb(border_color) else {
        return String::new();
    };

    let mut out = String::new();
    for (i, stroke) in FRAME_STROKES.iter().enumerate() {
        let inset = 10.0 + i as f64 * FRAME_STEP;
        out.push_str(&format!(
            "#place(dx: {:.1}mm, dy: {:.1}mm, rect(width: {:.1}mm, height: {:.1}mm, \
             stroke: {:.1}mm + rgb({}, {}, {})))\n",
            inset,
            inset,
            layout.page_width - 2.0 * inset,
            layout.page_height - 2.0 * inset,
            stroke,
            r,
            g,
            b
        ));
    }
    out
}

/// Draw every staged image of a slot at the same position, in order. Two
/// files (system plus uploaded) stack with the uploaded one on top.
pub fn image_source(images: &[StagedImage], x: f64, y: f64, w: Option<f64>, h: Option<f64>) -> String {
    let mut out = String::new();
    for image in images {
        let mut args = format!("\"{}\"", escape_typst_string(&image.staged_name));
        if let Some(w) = w {
            args.push_str(&format!(", width: {:.1}mm", w));
        }
        if let Some(h) = h {
            args.push_str(&format!(", height: {:.1}mm", h));
        }
        out.push_str(&format!(
            "#place(dx: {:.1}mm, dy: {:.1}mm, image({}))\n",
            x, y, args
        ));
    }
    out
}

/// Watermark slot: the images, then the washout overlay.
pub fn watermark_source(images: &[StagedImage], layout: &Layout) -> String {
    if images.is_empty() {
        return String::new();
    }
    let mut out = image_source(
        images,
        layout.watermark_x,
        layout.watermark_y,
        Some(layout.watermark_w),
        Some(layout.watermark_h),
    );
    out.push_str(&format!(
        "#place(dx: {:.1}mm, dy: {:.1}mm, rect(width: {:.1}mm, height: {:.1}mm, fill: {}))\n",
        layout.watermark_x, layout.watermark_y, layout.watermark_w, layout.watermark_h,
        WATERMARK_OVERLAY
    ));
    out
}

/// A centered text block spanning the text column. Skipped when empty so
/// sparse certificates stay valid.
pub fn centered_text(
    layout: &Layout,
    y: f64,
    size_pt: f64,
    color: Option<(u8, u8, u8)>,
    value: &str,
) -> String {
    if value.is_empty() {
        return String::new();
    }
    let fill = match color {
        Some((r, g, b)) => format!(", fill: rgb({}, {}, {})", r, g, b),
        None => String::new(),
    };
    format!(
        "#place(dx: {:.1}mm, dy: {:.1}mm, box(width: {:.1}mm, align(center, \
         text(size: {:.0}pt{}, \"{}\"))))\n",
        layout.text_x,
        y,
        layout.text_width(),
        size_pt,
        fill,
        escape_typst_string(value)
    )
}

/// A left-aligned text block at an absolute position.
pub fn placed_text(x: f64, y: f64, size_pt: f64, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    format!(
        "#place(dx: {:.1}mm, dy: {:.1}mm, text(size: {:.0}pt, \"{}\"))\n",
        x,
        y,
        size_pt,
        escape_typst_string(value)
    )
}

/// The image and frame layers shared by every template: border image, frame,
/// washed watermark, seal, signature. Order matters; later draws overlay
/// earlier ones.
pub fn base_layers(job: &RenderJob, layout: &Layout) -> String {
    let mut out = String::new();
    out.push_str(&image_source(
        &job.images.border,
        layout.border_x,
        layout.border_y,
        Some(layout.border_w),
        Some(layout.border_h),
    ));
    out.push_str(&frame_source(layout, job.definition.border_color));
    out.push_str(&watermark_source(&job.images.watermark, layout));
    out.push_str(&image_source(
        &job.images.seal,
        layout.seal_x,
        layout.seal_y,
        None,
        None,
    ));
    out.push_str(&image_source(
        &job.images.signature,
        layout.signature_x,
        layout.signature_y,
        None,
        None,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_typst_string() {
        assert_eq!(
            escape_typst_string(r#"Quote "this" now"#),
            r#"Quote \"this\" now"#
        );
        assert_eq!(escape_typst_string("a\\b\nc"), r"a\\b\nc");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Rust 101", "x"), "rust-101");
        assert_eq!(sanitize_name("  Intro & Basics  ", "x"), "intro-basics");
        assert_eq!(sanitize_name("###", "fallback"), "fallback");
    }

    #[test]
    fn test_document_filename() {
        assert_eq!(
            document_filename("RUST101", "Certificate of Achievement"),
            "rust101_certificate-of-achievement.pdf"
        );
    }

    #[test]
    fn test_frame_skipped_without_color() {
        use crate::render::{AchievementTemplate, Orientation, Template};
        let layout = AchievementTemplate.layout(Orientation::Landscape);
        assert!(frame_source(&layout, 0).is_empty());
        let framed = frame_source(&layout, 3);
        assert_eq!(framed.matches("rect(").count(), 3);
        assert!(framed.contains("rgb(0, 51, 204)"));
    }
}
