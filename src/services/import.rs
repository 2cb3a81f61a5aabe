use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::ApiError,
    models::{
        assignment::{ImportMode, ImportTemplateRequest, TenantProductFormAssignment},
        template::{with_steps, FormSectionTemplate, FormStep, TemplateSectionType},
    },
    services::{
        assignments::{AssignmentService, ASSIGNMENT_COLUMNS},
        catalog::CatalogService,
        metrics,
        templates::TemplateService,
    },
};

pub struct ImportService;

impl ImportService {
    /// Import a library template into one slot of a product's form.
    ///
    /// The product's live form content is a product-scoped template row:
    /// when the slot already points at one it is mutated in place, otherwise
    /// the merge result is materialized into a new product-scoped row and
    /// the slot re-pointed. Library templates are never mutated by imports,
    /// so editing one later cannot rewrite forms patients already see.
    pub async fn import(
        pool: &PgPool,
        tenant: &str,
        treatment_id: Uuid,
        req: &ImportTemplateRequest,
    ) -> Result<TenantProductFormAssignment, ApiError> {
        let schema = schema_name(tenant);

        let source = TemplateService::get(pool, tenant, req.template_id).await?;
        if !source.is_active && !req.allow_inactive {
            return Err(ApiError::TemplateNotFound(req.template_id));
        }
        let actual = source.section_type().ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!(
                "Corrupt section_type on template {}",
                source.id
            ))
        })?;
        if actual != req.section_type {
            return Err(ApiError::SectionTypeMismatch {
                template_id: source.id,
                expected: req.section_type,
                actual,
            });
        }

        CatalogService::get_product(pool, tenant, treatment_id).await?;

        let existing = AssignmentService::fetch(pool, tenant, treatment_id).await?;
        if let Some(until) = existing
            .as_ref()
            .filter(|a| a.is_locked_at(Utc::now()))
            .and_then(|a| a.locked_until)
        {
            return Err(ApiError::AssignmentLocked { locked_until: until });
        }

        let bound = Self::bound_template(pool, tenant, existing.as_ref(), req.section_type).await?;
        let current_steps = bound.as_ref().map(|t| t.steps()).unwrap_or_default();
        let mode = effective_mode(req.mode, !current_steps.is_empty());
        let merged = merge_steps(&current_steps, &source.steps(), mode);

        let mut tx = pool.begin().await?;

        let slot_template_id = match &bound {
            Some(own) if own.treatment_id == Some(treatment_id) => {
                sqlx::query(&format!(
                    "UPDATE {schema}.form_templates
                     SET schema = $1, version = version + 1
                     WHERE id = $2"
                ))
                .bind(with_steps(&own.schema, &merged))
                .bind(own.id)
                .execute(&mut *tx)
                .await?;
                own.id
            }
            _ => {
                // Appending to a shared/default template forks its identity;
                // replacing takes the source's.
                let basis = match (mode, &bound) {
                    (ImportMode::Append, Some(shared)) => shared,
                    _ => &source,
                };
                sqlx::query_scalar::<_, Uuid>(&format!(
                    "INSERT INTO {schema}.form_templates
                         (name, description, section_type, category, treatment_id, schema)
                     VALUES ($1, $2, $3::\"{schema}\".template_section_type, $4, $5, $6)
                     RETURNING id"
                ))
                .bind(&basis.name)
                .bind(&basis.description)
                .bind(req.section_type.to_string())
                .bind(&basis.category)
                .bind(treatment_id)
                .bind(with_steps(&basis.schema, &merged))
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let assignment = match existing {
            Some(row) => {
                let column = req.section_type.assignment_column();
                let updated = sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
                    "UPDATE {schema}.product_form_assignments
                     SET {column} = $1
                     WHERE treatment_id = $2
                       AND (locked_until IS NULL OR locked_until < NOW())
                     RETURNING {ASSIGNMENT_COLUMNS}"
                ))
                .bind(slot_template_id)
                .bind(treatment_id)
                .fetch_optional(&mut *tx)
                .await?;
                match updated {
                    Some(updated) => updated,
                    // Locked between the pre-check and the update; the
                    // content write above rolls back with the transaction.
                    None => {
                        return Err(ApiError::AssignmentLocked {
                            locked_until: row.locked_until.unwrap_or_else(Utc::now),
                        })
                    }
                }
            }
            None => {
                let mut slots = [None, None, None];
                for (i, section_type) in TemplateSectionType::all().into_iter().enumerate() {
                    slots[i] = if section_type == req.section_type {
                        Some(slot_template_id)
                    } else {
                        TemplateService::default_for(pool, tenant, section_type)
                            .await?
                            .map(|t| t.id)
                    };
                }
                let [personalization, account, doctor] = slots;
                sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
                    "INSERT INTO {schema}.product_form_assignments
                         (treatment_id, personalization_template_id, account_template_id, doctor_template_id)
                     VALUES ($1, $2, $3, $4)
                     RETURNING {ASSIGNMENT_COLUMNS}"
                ))
                .bind(treatment_id)
                .bind(personalization)
                .bind(account)
                .bind(doctor)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        metrics::record_import(tenant, mode);
        Ok(assignment)
    }

    /// Clear one slot of a product's form. The assignment row and its
    /// publish history survive; clearing an already-empty slot is a no-op.
    /// A product-scoped fork bound to the slot is deactivated with it, so
    /// detach/import cycles do not accumulate live orphan rows.
    pub async fn detach(
        pool: &PgPool,
        tenant: &str,
        treatment_id: Uuid,
        section_type: TemplateSectionType,
    ) -> Result<TenantProductFormAssignment, ApiError> {
        let schema = schema_name(tenant);
        let existing = AssignmentService::fetch(pool, tenant, treatment_id)
            .await?
            .ok_or(ApiError::NotFound("assignment"))?;

        if existing.slot(section_type).is_none() {
            return Ok(existing);
        }

        let bound = Self::bound_template(pool, tenant, Some(&existing), section_type).await?;

        let mut tx = pool.begin().await?;

        let column = section_type.assignment_column();
        let updated = sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
            "UPDATE {schema}.product_form_assignments
             SET {column} = NULL
             WHERE treatment_id = $1
               AND (locked_until IS NULL OR locked_until < NOW())
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(treatment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::AssignmentLocked {
            locked_until: existing.locked_until.unwrap_or_else(Utc::now),
        })?;

        if let Some(fork_id) = fork_to_retire(bound.as_ref(), treatment_id) {
            sqlx::query(&format!(
                "UPDATE {schema}.form_templates SET is_active = FALSE WHERE id = $1"
            ))
            .bind(fork_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn bound_template(
        pool: &PgPool,
        tenant: &str,
        assignment: Option<&TenantProductFormAssignment>,
        section_type: TemplateSectionType,
    ) -> Result<Option<FormSectionTemplate>, ApiError> {
        match assignment.and_then(|a| a.slot(section_type)) {
            Some(id) => match TemplateService::get(pool, tenant, id).await {
                Ok(template) => Ok(Some(template)),
                // Dangling slot reference reads as an empty form.
                Err(ApiError::TemplateNotFound(_)) => Ok(None),
                Err(err) => Err(err),
            },
            None => Ok(None),
        }
    }
}

/// The product-scoped fork a detach retires, if the slot held one. Shared
/// library templates survive a detach untouched.
pub fn fork_to_retire(
    bound: Option<&FormSectionTemplate>,
    treatment_id: Uuid,
) -> Option<Uuid> {
    bound
        .filter(|t| t.treatment_id == Some(treatment_id))
        .map(|t| t.id)
}

/// An empty slot has nothing to merge into, so `append` degrades to
/// `replace` and the client-side mode prompt is skipped.
pub fn effective_mode(requested: ImportMode, has_steps: bool) -> ImportMode {
    if has_steps {
        requested
    } else {
        ImportMode::Replace
    }
}

/// Copy steps with fresh identities, numbered sequentially from `start`.
/// Imports copy rather than alias so a step edit in one form can never leak
/// into another. Schema PATCHes accept arbitrary step numbers, so the
/// sequence saturates at `i32::MAX` instead of wrapping.
pub fn renumber_from(steps: &[FormStep], start: i32) -> Vec<FormStep> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| FormStep {
            id: format!("step-{}", Uuid::new_v4()),
            number: start.saturating_add(i as i32),
            title: step.title.clone(),
            extra: step.extra.clone(),
        })
        .collect()
}

/// Merge semantics of an import. `replace` discards the current steps;
/// `append` keeps them verbatim (ids and numbers untouched, in-flight
/// sessions keep valid references) and continues numbering after the
/// current maximum.
pub fn merge_steps(current: &[FormStep], source: &[FormStep], mode: ImportMode) -> Vec<FormStep> {
    match mode {
        ImportMode::Replace => renumber_from(source, 1),
        ImportMode::Append => {
            let next = current
                .iter()
                .map(|s| s.number)
                .max()
                .unwrap_or(0)
                .saturating_add(1);
            let mut merged = current.to_vec();
            merged.extend(renumber_from(source, next));
            merged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::steps_of;
    use serde_json::json;

    fn step(id: &str, number: i32) -> FormStep {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "questions".to_string(),
            json!([{ "id": format!("q-{id}"), "type": "text" }]),
        );
        FormStep {
            id: id.to_string(),
            number,
            title: Some(format!("Step {id}")),
            extra,
        }
    }

    #[test]
    fn append_is_forced_to_replace_without_steps() {
        assert_eq!(
            effective_mode(ImportMode::Append, false),
            ImportMode::Replace
        );
        assert_eq!(effective_mode(ImportMode::Append, true), ImportMode::Append);
        assert_eq!(
            effective_mode(ImportMode::Replace, true),
            ImportMode::Replace
        );
    }

    #[test]
    fn renumber_copies_with_fresh_ids() {
        let source = vec![step("t1", 4), step("t2", 9)];
        let copies = renumber_from(&source, 1);
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].number, 1);
        assert_eq!(copies[1].number, 2);
        assert_ne!(copies[0].id, "t1");
        assert_ne!(copies[1].id, "t2");
        assert_eq!(copies[0].title.as_deref(), Some("Step t1"));
        // Question payload travels with the copy.
        assert!(copies[0].extra.contains_key("questions"));
    }

    #[test]
    fn replace_discards_current_and_renumbers_from_one() {
        let current = vec![step("s1", 1), step("s2", 2)];
        let source = vec![step("t1", 1), step("t2", 2)];
        let merged = merge_steps(&current, &source, ImportMode::Replace);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.iter().map(|s| s.number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(merged.iter().all(|s| s.id != "s1" && s.id != "s2"));
        assert!(merged.iter().all(|s| s.id != "t1" && s.id != "t2"));
    }

    #[test]
    fn append_keeps_existing_identity_and_continues_numbering() {
        let current = vec![step("s1", 1), step("s2", 2)];
        let source = vec![step("t1", 1), step("t2", 2)];
        let merged = merge_steps(&current, &source, ImportMode::Append);

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].id, "s1");
        assert_eq!(merged[1].id, "s2");
        assert_eq!(
            merged.iter().map(|s| s.number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(merged[2].id != "t1" && merged[3].id != "t2");
    }

    #[test]
    fn append_continues_after_sparse_numbering() {
        let current = vec![step("s1", 2), step("s2", 7)];
        let source = vec![step("t1", 1)];
        let merged = merge_steps(&current, &source, ImportMode::Append);
        assert_eq!(merged[2].number, 8);
    }

    #[test]
    fn append_saturates_at_the_numbering_limit() {
        // A schema PATCH can store any i32 step number; appending after
        // i32::MAX must neither panic nor wrap the sequence negative.
        let current = vec![step("s1", i32::MAX)];
        let source = vec![step("t1", 1), step("t2", 2)];
        let merged = merge_steps(&current, &source, ImportMode::Append);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, "s1");
        assert!(merged.iter().all(|s| s.number > 0));
        assert_eq!(merged[1].number, i32::MAX);
        assert_eq!(merged[2].number, i32::MAX);
    }

    #[test]
    fn steps_parse_is_tolerant_of_malformed_schemas() {
        assert!(steps_of(&json!({})).is_empty());
        assert!(steps_of(&json!({ "steps": "not-an-array" })).is_empty());
        assert!(steps_of(&json!(null)).is_empty());

        // A step missing required fields is skipped, the rest survive.
        let mixed = json!({
            "steps": [
                { "id": "ok", "number": 1 },
                { "title": "no id or number" }
            ]
        });
        let steps = steps_of(&mixed);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, "ok");
    }

    #[test]
    fn with_steps_preserves_other_schema_keys() {
        let schema = json!({
            "steps": [{ "id": "old", "number": 1 }],
            "layout_hints": { "columns": 2 },
            "intro": "Welcome"
        });
        let rewritten = with_steps(&schema, &[step("new", 1)]);
        assert_eq!(rewritten["layout_hints"]["columns"], 2);
        assert_eq!(rewritten["intro"], "Welcome");
        let steps = steps_of(&rewritten);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, "new");
    }

    #[test]
    fn step_payload_survives_a_merge_roundtrip() {
        let schema = json!({ "steps": [] });
        let merged = merge_steps(&[], &[step("t1", 1)], ImportMode::Replace);
        let rewritten = with_steps(&schema, &merged);
        let back = steps_of(&rewritten);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].extra["questions"][0]["type"], "text");
    }

    fn template(treatment_id: Option<Uuid>) -> FormSectionTemplate {
        FormSectionTemplate {
            id: Uuid::new_v4(),
            name: "Hair Loss Intake".to_string(),
            description: None,
            section_type: "personalization".to_string(),
            category: None,
            treatment_id,
            schema: json!({ "steps": [] }),
            version: 1,
            is_default: false,
            published_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn detach_retires_only_the_products_own_fork() {
        let product = Uuid::new_v4();

        let fork = template(Some(product));
        assert_eq!(fork_to_retire(Some(&fork), product), Some(fork.id));

        let library = template(None);
        assert_eq!(fork_to_retire(Some(&library), product), None);

        let other_products = template(Some(Uuid::new_v4()));
        assert_eq!(fork_to_retire(Some(&other_products), product), None);

        assert_eq!(fork_to_retire(None, product), None);
    }
}
