//! The "achievement" template: a plain English-language certificate with a
//! gold title. Layout constants are design values carried over from the
//! print masters, in mm.

use super::common::{base_layers, centered_text, page_setup, placed_text};
use super::{Layout, Orientation, RenderJob, Template};

const TITLE_COLOR: (u8, u8, u8) = (247, 183, 23);
const FONT: &str = "Libertinus Serif";

const LANDSCAPE: Layout = Layout {
    page_width: 297.0,
    page_height: 210.0,
    text_x: 10.0,
    text_y: 30.0,
    seal_x: 230.0,
    seal_y: 150.0,
    signature_x: 47.0,
    signature_y: 155.0,
    custom_x: 47.0,
    custom_y: 155.0,
    watermark_x: 40.0,
    watermark_y: 31.0,
    watermark_w: 212.0,
    watermark_h: 148.0,
    border_x: 0.0,
    border_y: 0.0,
    border_w: 297.0,
    border_h: 210.0,
    code_y: 175.0,
};

const PORTRAIT: Layout = Layout {
    page_width: 210.0,
    page_height: 297.0,
    text_x: 10.0,
    text_y: 40.0,
    seal_x: 150.0,
    seal_y: 220.0,
    signature_x: 30.0,
    signature_y: 230.0,
    custom_x: 30.0,
    custom_y: 230.0,
    watermark_x: 26.0,
    watermark_y: 58.0,
    watermark_w: 158.0,
    watermark_h: 170.0,
    border_x: 0.0,
    border_y: 0.0,
    border_w: 210.0,
    border_h: 297.0,
    code_y: 250.0,
};

pub struct AchievementTemplate;

impl Template for AchievementTemplate {
    fn id(&self) -> &'static str {
        "achievement"
    }

    fn layout(&self, orientation: Orientation) -> Layout {
        match orientation {
            Orientation::Landscape => LANDSCAPE,
            Orientation::Portrait => PORTRAIT,
        }
    }

    fn source(&self, job: &RenderJob) -> String {
        let layout = self.layout(job.orientation);
        let content = job.content;
        let y = layout.text_y;

        let mut out = page_setup(&layout, FONT);
        out.push_str(&base_layers(job, &layout));

        out.push_str(&centered_text(
            &layout,
            y,
            30.0,
            Some(TITLE_COLOR),
            "CERTIFICATE of ACHIEVEMENT",
        ));
        out.push_str(&centered_text(
            &layout,
            y + 25.0,
            14.0,
            None,
            "This is to certify that",
        ));
        out.push_str(&centered_text(
            &layout,
            y + 35.0,
            24.0,
            None,
            &content.recipient_name,
        ));
        out.push_str(&centered_text(
            &layout,
            y + 55.0,
            14.0,
            None,
            "has completed the course",
        ));
        out.push_str(&centered_text(
            &layout,
            y + 65.0,
            20.0,
            None,
            &content.course_name,
        ));
        out.push_str(&centered_text(&layout, y + 80.0, 12.0, None, &content.grade));
        out.push_str(&centered_text(
            &layout,
            y + 88.0,
            12.0,
            None,
            &content.outcome,
        ));
        if let Some(hours) = &content.credit_hours {
            out.push_str(&centered_text(
                &layout,
                y + 96.0,
                12.0,
                None,
                &format!("Credit hours: {}", hours),
            ));
        }
        out.push_str(&centered_text(&layout, y + 108.0, 14.0, None, &content.date));

        let mut line_y = layout.custom_y;
        for teacher in &content.teachers {
            out.push_str(&placed_text(layout.custom_x, line_y, 12.0, teacher));
            line_y += 6.0;
        }
        if !content.custom_text.is_empty() {
            out.push_str(&placed_text(
                layout.custom_x,
                line_y,
                11.0,
                &content.custom_text,
            ));
        }

        out.push_str(&centered_text(
            &layout,
            layout.code_y,
            10.0,
            None,
            &content.code,
        ));

        out
    }
}
