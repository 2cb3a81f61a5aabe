use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::ApiError,
    models::template::{
        CreateTemplateRequest, FormSectionTemplate, TemplateFilter, TemplateSectionType,
        UpdateTemplateSchemaRequest,
    },
};

/// Explicit column list for FormSectionTemplate — casts the section_type
/// enum to TEXT.
pub const TEMPLATE_COLUMNS: &str =
    "id, name, description, section_type::TEXT AS section_type, category, treatment_id, \
     schema, version, is_default, published_at, is_active, created_at, updated_at";

pub struct TemplateService;

impl TemplateService {
    /// List active templates. Without a `treatment_id` filter only library
    /// rows (unscoped) are returned; product-scoped rows are the materialized
    /// per-product forms and would pollute selection lists.
    pub async fn list(
        pool: &PgPool,
        tenant: &str,
        filter: &TemplateFilter,
    ) -> Result<Vec<FormSectionTemplate>, ApiError> {
        let schema = schema_name(tenant);
        let templates = sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {schema}.form_templates
             WHERE is_active = TRUE
               AND (($1::uuid IS NULL AND treatment_id IS NULL) OR treatment_id = $1)
               AND ($2::text IS NULL OR section_type::text = $2)
               AND ($3::text IS NULL OR category = $3)
             ORDER BY created_at DESC"
        ))
        .bind(filter.treatment_id)
        .bind(filter.section_type.map(|t| t.to_string()))
        .bind(&filter.category)
        .fetch_all(pool)
        .await?;
        Ok(templates)
    }

    /// Fetch by id, inactive rows included. Assignment slots may reference a
    /// deactivated template; it must stay resolvable.
    pub async fn get(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
    ) -> Result<FormSectionTemplate, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {schema}.form_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::TemplateNotFound(id))
    }

    pub async fn create(
        pool: &PgPool,
        tenant: &str,
        req: &CreateTemplateRequest,
    ) -> Result<FormSectionTemplate, ApiError> {
        if req.name.trim().is_empty() {
            return Err(ApiError::validation("Template name must not be empty"));
        }
        let schema = schema_name(tenant);
        let template = sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "INSERT INTO {schema}.form_templates
                 (name, description, section_type, category, treatment_id, schema, published_at)
             VALUES ($1, $2, $3::\"{schema}\".template_section_type, $4, $5, $6, $7)
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.section_type.to_string())
        .bind(&req.category)
        .bind(req.treatment_id)
        .bind(req.schema.clone().unwrap_or_else(|| json!({})))
        .bind(req.published_at)
        .fetch_one(pool)
        .await?;
        Ok(template)
    }

    /// Replace the question schema and bump the version. Products whose
    /// assignment references this template see the new schema immediately;
    /// no re-import involved.
    pub async fn update_schema(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &UpdateTemplateSchemaRequest,
    ) -> Result<FormSectionTemplate, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "UPDATE {schema}.form_templates
             SET schema = $1, version = version + 1
             WHERE id = $2
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(&req.schema)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::TemplateNotFound(id))
    }

    /// Soft delete. References from assignment slots are left untouched; the
    /// row stays resolvable by id.
    pub async fn deactivate(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
    ) -> Result<FormSectionTemplate, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "UPDATE {schema}.form_templates
             SET is_active = FALSE
             WHERE id = $1
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::TemplateNotFound(id))
    }

    /// The clinic's seeded default template for a slot, if still active.
    pub async fn default_for(
        pool: &PgPool,
        tenant: &str,
        section_type: TemplateSectionType,
    ) -> Result<Option<FormSectionTemplate>, ApiError> {
        let schema = schema_name(tenant);
        let template = sqlx::query_as::<_, FormSectionTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM {schema}.form_templates
             WHERE section_type::text = $1 AND is_default AND is_active = TRUE
             LIMIT 1"
        ))
        .bind(section_type.to_string())
        .fetch_optional(pool)
        .await?;
        Ok(template)
    }
}
