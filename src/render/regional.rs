//! The "regional" template: Indonesian-language wording with a navy title
//! and an embedded serif face. Same page geometry as the achievement
//! variant; only the text stack differs.

use super::common::{base_layers, centered_text, page_setup, placed_text};
use super::{AchievementTemplate, Layout, Orientation, RenderJob, Template};

const TITLE_COLOR: (u8, u8, u8) = (0, 0, 120);
const FONT: &str = "Noto Serif";

pub struct RegionalTemplate;

impl Template for RegionalTemplate {
    fn id(&self) -> &'static str {
        "regional"
    }

    fn layout(&self, orientation: Orientation) -> Layout {
        AchievementTemplate.layout(orientation)
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
            "SERTIFIKAT",
        ));
        out.push_str(&centered_text(
            &layout,
            y + 25.0,
            14.0,
            None,
            "Diberikan kepada",
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
            "atas keberhasilannya menyelesaikan kursus",
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
                &format!("Jumlah jam: {}", hours),
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
