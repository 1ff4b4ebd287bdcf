//! Certificate definition persistence and host course lookups.
//!
//! Definitions are read on every view request, so reads go through the moka
//! cache; every write invalidates the touched entry.

use uuid::Uuid;

use super::AppState;
use crate::certificate::models::{
    CertificateDefinition, Course, CreateCertificateRequest, UpdateCertificateRequest,
};

const DEFINITION_COLUMNS: &str = "id, course_id, name, intro, template, orientation, \
     border_style, border_color, watermark, signature, seal, delivery, save_copy, \
     email_teachers, email_others, required_minutes, date_source, date_format, \
     grade_source, grade_format, outcome_source, print_hours, print_teacher, \
     print_number, custom_text, created_at, updated_at";

impl AppState {
    pub async fn get_certificate(
        &self,
        id: Uuid,
    ) -> Result<Option<CertificateDefinition>, sqlx::Error> {
        if let Some(cached) = self.definition_cache.get(&id).await {
            return Ok(Some(cached));
        }

        let definition = sqlx::query_as::<_, CertificateDefinition>(&format!(
            "SELECT {} FROM certificate_definitions WHERE id = $1",
            DEFINITION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(definition) = &definition {
            self.definition_cache.insert(id, definition.clone()).await;
        }
        Ok(definition)
    }

    pub async fn list_certificates_for_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<CertificateDefinition>, sqlx::Error> {
        sqlx::query_as::<_, CertificateDefinition>(&format!(
            "SELECT {} FROM certificate_definitions WHERE course_id = $1 ORDER BY created_at",
            DEFINITION_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn insert_certificate(
        &self,
        req: &CreateCertificateRequest,
    ) -> Result<CertificateDefinition, sqlx::Error> {
        let definition = sqlx::query_as::<_, CertificateDefinition>(&format!(
            r#"
            INSERT INTO certificate_definitions (
                id, course_id, name, intro, template, orientation, border_style,
                border_color, watermark, signature, seal, delivery, save_copy,
                email_teachers, email_others, required_minutes, date_source,
                date_format, grade_source, grade_format, outcome_source,
                print_hours, print_teacher, print_number, custom_text,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25,
                NOW(), NOW()
            )
            RETURNING {}
            "#,
            DEFINITION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(req.course_id)
        .bind(&req.name)
        .bind(&req.intro)
        .bind(&req.template)
        .bind(&req.orientation)
        .bind(&req.border_style)
        .bind(req.border_color)
        .bind(&req.watermark)
        .bind(&req.signature)
        .bind(&req.seal)
        .bind(req.delivery)
        .bind(req.save_copy)
        .bind(req.email_teachers)
        .bind(&req.email_others)
        .bind(req.required_minutes)
        .bind(req.date_source)
        .bind(req.date_format)
        .bind(req.grade_source)
        .bind(req.grade_format)
        .bind(req.outcome_source)
        .bind(&req.print_hours)
        .bind(req.print_teacher)
        .bind(req.print_number)
        .bind(&req.custom_text)
        .fetch_one(&self.pool)
        .await?;

        Ok(definition)
    }

    pub async fn update_certificate(
        &self,
        id: Uuid,
        req: &UpdateCertificateRequest,
    ) -> Result<Option<CertificateDefinition>, sqlx::Error> {
        let definition = sqlx::query_as::<_, CertificateDefinition>(&format!(
            r#"
            UPDATE certificate_definitions SET
                name = COALESCE($2, name),
                intro = COALESCE($3, intro),
                template = COALESCE($4, template),
                orientation = COALESCE($5, orientation),
                border_style = COALESCE($6, border_style),
                border_color = COALESCE($7, border_color),
                watermark = COALESCE($8, watermark),
                signature = COALESCE($9, signature),
                seal = COALESCE($10, seal),
                delivery = COALESCE($11, delivery),
                save_copy = COALESCE($12, save_copy),
                email_teachers = COALESCE($13, email_teachers),
                email_others = COALESCE($14, email_others),
                required_minutes = COALESCE($15, required_minutes),
                date_source = COALESCE($16, date_source),
                date_format = COALESCE($17, date_format),
                grade_source = COALESCE($18, grade_source),
                grade_format = COALESCE($19, grade_format),
                outcome_source = COALESCE($20, outcome_source),
                print_hours = COALESCE($21, print_hours),
                print_teacher = COALESCE($22, print_teacher),
                print_number = COALESCE($23, print_number),
                custom_text = COALESCE($24, custom_text),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DEFINITION_COLUMNS
        ))
        .bind(id)
        .bind(&req.name)
        .bind(&req.intro)
        .bind(&req.template)
        .bind(&req.orientation)
        .bind(&req.border_style)
        .bind(req.border_color)
        .bind(&req.watermark)
        .bind(&req.signature)
        .bind(&req.seal)
        .bind(req.delivery)
        .bind(req.save_copy)
        .bind(req.email_teachers)
        .bind(&req.email_others)
        .bind(req.required_minutes)
        .bind(req.date_source)
        .bind(req.date_format)
        .bind(req.grade_source)
        .bind(req.grade_format)
        .bind(req.outcome_source)
        .bind(&req.print_hours)
        .bind(req.print_teacher)
        .bind(req.print_number)
        .bind(&req.custom_text)
        .fetch_optional(&self.pool)
        .await?;

        self.definition_cache.invalidate(&id).await;
        Ok(definition)
    }

    pub async fn delete_certificate(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM certificate_definitions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.definition_cache.invalidate(&id).await;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_course(&self, id: Uuid) -> Result<Option<Course>, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            "SELECT id, short_name, full_name FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
