use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::ApiError,
    models::structure::{
        CreateStructureRequest, FormSection, GlobalFormStructure, ReorderSectionsRequest,
        SaveStructureRequest, SectionType,
    },
};

pub struct StructureService;

impl StructureService {
    /// List all structures for a clinic. A clinic that has none yet gets the
    /// system default seeded first, so the result is never empty.
    pub async fn list(pool: &PgPool, tenant: &str) -> Result<Vec<GlobalFormStructure>, ApiError> {
        let schema = schema_name(tenant);
        let structures = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "SELECT * FROM {schema}.form_structures ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await?;

        if !structures.is_empty() {
            return Ok(structures);
        }

        sqlx::query(&format!(
            "INSERT INTO {schema}.form_structures (name, description, sections, is_default)
             VALUES ($1, $2, $3, TRUE)
             ON CONFLICT DO NOTHING"
        ))
        .bind("Standard intake flow")
        .bind("System default created on first use")
        .bind(sqlx::types::Json(default_sections()))
        .execute(pool)
        .await?;

        let structures = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "SELECT * FROM {schema}.form_structures ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await?;
        Ok(structures)
    }

    pub async fn create(
        pool: &PgPool,
        tenant: &str,
        req: &CreateStructureRequest,
    ) -> Result<GlobalFormStructure, ApiError> {
        let schema = schema_name(tenant);
        let mut sections = req.sections.clone();
        validate_sections(&sections)?;
        normalize_sections(&mut sections);

        let mut tx = pool.begin().await?;
        let is_default = req.is_default.unwrap_or(false);
        if is_default {
            sqlx::query(&format!(
                "UPDATE {schema}.form_structures SET is_default = FALSE WHERE is_default"
            ))
            .execute(&mut *tx)
            .await?;
        }
        let structure = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "INSERT INTO {schema}.form_structures (name, description, sections, is_default)
             VALUES ($1, $2, $3, $4)
             RETURNING *"
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(sqlx::types::Json(&sections))
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(structure)
    }

    /// Whole-array save. The submitted `version` must match the stored one;
    /// a stale save is rejected instead of silently clobbering another
    /// editor's changes.
    pub async fn save(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &SaveStructureRequest,
    ) -> Result<GlobalFormStructure, ApiError> {
        let schema = schema_name(tenant);
        let mut sections = req.sections.clone();
        validate_sections(&sections)?;
        normalize_sections(&mut sections);

        let mut tx = pool.begin().await?;
        let current = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "SELECT * FROM {schema}.form_structures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("structure"))?;

        match req.is_default {
            Some(true) => {
                sqlx::query(&format!(
                    "UPDATE {schema}.form_structures SET is_default = FALSE
                     WHERE is_default AND id <> $1"
                ))
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) if current.is_default => {
                return Err(ApiError::validation(
                    "Cannot unset the default structure; mark another structure as default instead",
                ));
            }
            _ => {}
        }

        let updated = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "UPDATE {schema}.form_structures
             SET name = COALESCE($1, name),
                 description = COALESCE($2, description),
                 is_default = COALESCE($3, is_default),
                 sections = $4,
                 version = version + 1
             WHERE id = $5 AND version = $6
             RETURNING *"
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.is_default)
        .bind(sqlx::types::Json(&sections))
        .bind(id)
        .bind(req.version)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::ConcurrentModification { submitted: req.version })?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Move one section within a structure's list. Runs under the same
    /// version guard as a full save.
    pub async fn reorder_sections(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &ReorderSectionsRequest,
    ) -> Result<GlobalFormStructure, ApiError> {
        let schema = schema_name(tenant);
        let current = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "SELECT * FROM {schema}.form_structures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("structure"))?;

        let mut sections = current.sections.0;
        reorder(&mut sections, req.from_index, req.to_index)?;
        normalize_sections(&mut sections);

        let updated = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "UPDATE {schema}.form_structures
             SET sections = $1, version = version + 1
             WHERE id = $2 AND version = $3
             RETURNING *"
        ))
        .bind(sqlx::types::Json(&sections))
        .bind(id)
        .bind(req.version)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::ConcurrentModification { submitted: req.version })?;
        Ok(updated)
    }

    pub async fn delete(pool: &PgPool, tenant: &str, id: Uuid) -> Result<(), ApiError> {
        let schema = schema_name(tenant);
        let current = sqlx::query_as::<_, GlobalFormStructure>(&format!(
            "SELECT * FROM {schema}.form_structures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("structure"))?;

        if current.is_default {
            return Err(ApiError::validation("The default structure cannot be deleted"));
        }

        sqlx::query(&format!("DELETE FROM {schema}.form_structures WHERE id = $1"))
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// The 4-section flow every clinic starts from.
pub fn default_sections() -> Vec<FormSection> {
    let section = |id: &str, ty: SectionType, label: &str, order: i32, icon: &str| FormSection {
        id: id.to_string(),
        section_type: ty,
        label: label.to_string(),
        description: None,
        order,
        enabled: true,
        icon: Some(icon.to_string()),
    };
    vec![
        section("product", SectionType::ProductQuestions, "Product questions", 1, "package"),
        section("category", SectionType::CategoryQuestions, "Category questions", 2, "list"),
        section("account", SectionType::AccountCreation, "Create account", 3, "user"),
        section("checkout", SectionType::Checkout, "Checkout", 4, "credit-card"),
    ]
}

/// Re-index `order` densely from 1 in array position and force the locked
/// section types back to enabled. Stale clients that submit a disabled
/// checkout are corrected silently rather than rejected.
pub fn normalize_sections(sections: &mut [FormSection]) {
    for (i, section) in sections.iter_mut().enumerate() {
        section.order = i as i32 + 1;
        if section.section_type.is_locked() {
            section.enabled = true;
        }
    }
}

pub fn validate_sections(sections: &[FormSection]) -> Result<(), ApiError> {
    let mut seen = std::collections::HashSet::new();
    for section in sections {
        if section.id.trim().is_empty() {
            return Err(ApiError::validation("Section id must not be empty"));
        }
        if section.label.trim().is_empty() {
            return Err(ApiError::validation("Section label must not be empty"));
        }
        if !seen.insert(section.id.as_str()) {
            return Err(ApiError::validation(format!(
                "Duplicate section id '{}'",
                section.id
            )));
        }
    }
    Ok(())
}

/// Move the element at `from` to position `to`, shifting the rest.
pub fn reorder<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), ApiError> {
    if from >= items.len() || to >= items.len() {
        return Err(ApiError::validation(format!(
            "Reorder index out of bounds ({} -> {}, {} sections)",
            from,
            to,
            items.len()
        )));
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, ty: SectionType, order: i32, enabled: bool) -> FormSection {
        FormSection {
            id: id.to_string(),
            section_type: ty,
            label: format!("{id} label"),
            description: None,
            order,
            enabled,
            icon: None,
        }
    }

    #[test]
    fn default_flow_has_four_enabled_sections_in_order() {
        let sections = default_sections();
        assert_eq!(sections.len(), 4);
        assert_eq!(
            sections.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(sections.iter().all(|s| s.enabled));
        assert_eq!(sections[0].section_type, SectionType::ProductQuestions);
        assert_eq!(sections[1].section_type, SectionType::CategoryQuestions);
        assert_eq!(sections[2].section_type, SectionType::AccountCreation);
        assert_eq!(sections[3].section_type, SectionType::Checkout);
    }

    #[test]
    fn normalize_reindexes_densely_from_one() {
        let mut sections = vec![
            section("a", SectionType::Custom, 7, true),
            section("b", SectionType::ProductQuestions, 3, true),
            section("c", SectionType::Custom, 99, false),
        ];
        normalize_sections(&mut sections);
        assert_eq!(
            sections.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn normalize_handles_empty_list() {
        let mut sections: Vec<FormSection> = vec![];
        normalize_sections(&mut sections);
        assert!(sections.is_empty());
    }

    #[test]
    fn normalize_forces_locked_sections_enabled() {
        let mut sections = vec![
            section("account", SectionType::AccountCreation, 1, false),
            section("checkout", SectionType::Checkout, 2, false),
            section("custom", SectionType::Custom, 3, false),
        ];
        normalize_sections(&mut sections);
        assert!(sections[0].enabled);
        assert!(sections[1].enabled);
        // Non-locked sections keep the submitted flag.
        assert!(!sections[2].enabled);
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let sections = vec![
            section("a", SectionType::Custom, 1, true),
            section("a", SectionType::Custom, 2, true),
        ];
        assert!(validate_sections(&sections).is_err());
    }

    #[test]
    fn validate_rejects_blank_ids_and_labels() {
        let mut blank_id = vec![section("", SectionType::Custom, 1, true)];
        assert!(validate_sections(&blank_id).is_err());
        blank_id[0].id = "ok".into();
        blank_id[0].label = "  ".into();
        assert!(validate_sections(&blank_id).is_err());
    }

    #[test]
    fn reorder_then_inverse_restores_original() {
        let original = vec![1, 2, 3, 4, 5];
        let mut items = original.clone();
        reorder(&mut items, 1, 3).unwrap();
        assert_eq!(items, vec![1, 3, 4, 2, 5]);
        reorder(&mut items, 3, 1).unwrap();
        assert_eq!(items, original);
    }

    #[test]
    fn reorder_same_index_is_identity() {
        let mut items = vec!["a", "b", "c"];
        reorder(&mut items, 2, 2).unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn reorder_out_of_bounds_is_rejected() {
        let mut items = vec![1, 2];
        assert!(reorder(&mut items, 0, 5).is_err());
        assert!(reorder(&mut items, 9, 0).is_err());
    }

    #[test]
    fn reorder_to_front_and_back() {
        let mut items = vec![1, 2, 3];
        reorder(&mut items, 2, 0).unwrap();
        assert_eq!(items, vec![3, 1, 2]);
        reorder(&mut items, 0, 2).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }
}
