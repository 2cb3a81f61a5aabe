use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::ApiError,
    models::{
        assignment::{FormState, ResolvedProductForm, TenantProductFormAssignment},
        product::{PageQuery, Pagination, Product},
        template::{steps_of, TemplateSectionType},
    },
    services::{catalog::CatalogService, templates::TemplateService},
};

/// Explicit column list for TenantProductFormAssignment — casts the
/// layout_template enum to TEXT.
pub const ASSIGNMENT_COLUMNS: &str =
    "id, treatment_id, doctor_template_id, personalization_template_id, account_template_id, \
     layout_template::TEXT AS layout_template, theme_id, locked_until, published_url, \
     last_published_at, created_at, updated_at";

pub struct AssignmentService;

impl AssignmentService {
    /// The merged admin view: every product of the catalog page, with its
    /// assignment when one exists. Catalog failure fails the request;
    /// assignment failure degrades to an all-unassigned page, since the
    /// catalog is the primary dataset and assignments only decorate it.
    pub async fn resolve(
        pool: &PgPool,
        tenant: &str,
        query: &PageQuery,
    ) -> Result<(Vec<ResolvedProductForm>, Pagination), ApiError> {
        let page = CatalogService::list_products(pool, tenant, query).await?;

        let assignments = match Self::fetch_all(pool, tenant).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!("Assignment lookup failed, rendering catalog unassigned: {err}");
                Vec::new()
            }
        };
        let by_treatment: HashMap<Uuid, TenantProductFormAssignment> = assignments
            .into_iter()
            .map(|a| (a.treatment_id, a))
            .collect();

        Ok((merge_catalog(page.products, by_treatment), page.pagination))
    }

    pub async fn fetch_all(
        pool: &PgPool,
        tenant: &str,
    ) -> Result<Vec<TenantProductFormAssignment>, ApiError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM {schema}.product_form_assignments"
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn fetch(
        pool: &PgPool,
        tenant: &str,
        treatment_id: Uuid,
    ) -> Result<Option<TenantProductFormAssignment>, ApiError> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM {schema}.product_form_assignments
             WHERE treatment_id = $1"
        ))
        .bind(treatment_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Current content of one slot of a product's form: the referenced
    /// template and how many steps it carries. Import flows use this to
    /// decide whether a merge-mode prompt is needed.
    pub async fn form_state(
        pool: &PgPool,
        tenant: &str,
        treatment_id: Uuid,
        section_type: TemplateSectionType,
    ) -> Result<FormState, ApiError> {
        CatalogService::get_product(pool, tenant, treatment_id).await?;
        let assignment = Self::fetch(pool, tenant, treatment_id).await?;
        let template_id = assignment.as_ref().and_then(|a| a.slot(section_type));

        let step_count = match template_id {
            Some(id) => match TemplateService::get(pool, tenant, id).await {
                Ok(template) => steps_of(&template.schema).len(),
                // A dangling slot reference renders as an empty form.
                Err(ApiError::TemplateNotFound(_)) => 0,
                Err(err) => return Err(err),
            },
            None => 0,
        };

        Ok(FormState {
            section_type,
            template_id,
            step_count,
            has_steps: step_count > 0,
        })
    }
}

/// Pure merge: one entry per catalog product, in catalog order. Products
/// without a row keep `assignment: None`; nothing synthetic is created here.
pub fn merge_catalog(
    products: Vec<Product>,
    mut by_treatment: HashMap<Uuid, TenantProductFormAssignment>,
) -> Vec<ResolvedProductForm> {
    products
        .into_iter()
        .map(|product| {
            let assignment = by_treatment.remove(&product.id);
            ResolvedProductForm { product, assignment }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assignment::ProductFormView;
    use chrono::Utc;

    fn product(name: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: None,
            category: Some("skincare".to_string()),
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assignment(treatment_id: Uuid) -> TenantProductFormAssignment {
        TenantProductFormAssignment {
            id: Uuid::new_v4(),
            treatment_id,
            doctor_template_id: Some(Uuid::new_v4()),
            personalization_template_id: None,
            account_template_id: None,
            layout_template: "layout_b".to_string(),
            theme_id: None,
            locked_until: None,
            published_url: Some("https://demo.example/form".to_string()),
            last_published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merge_keeps_catalog_order_and_pairs_rows() {
        let products = vec![product("A"), product("B"), product("C")];
        let assigned_id = products[1].id;
        let mut by_treatment = HashMap::new();
        by_treatment.insert(assigned_id, assignment(assigned_id));

        let merged = merge_catalog(products.clone(), by_treatment);
        assert_eq!(merged.len(), 3);
        let names: Vec<_> = merged.iter().map(|r| r.product.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(merged[0].assignment.is_none());
        assert!(merged[1].assignment.is_some());
        assert!(merged[2].assignment.is_none());
    }

    #[test]
    fn merge_ignores_rows_for_unknown_products() {
        let products = vec![product("A")];
        let stray = Uuid::new_v4();
        let mut by_treatment = HashMap::new();
        by_treatment.insert(stray, assignment(stray));

        let merged = merge_catalog(products, by_treatment);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].assignment.is_none());
    }

    #[test]
    fn unassigned_view_materializes_placeholder() {
        let p = product("Minoxidil 5%");
        let view = ProductFormView::from(ResolvedProductForm {
            product: p.clone(),
            assignment: None,
        });
        assert_eq!(view.id, format!("placeholder-{}", p.id));
        assert!(!view.has_assignment);
        assert_eq!(view.layout_template, "layout_a");
        assert_eq!(view.treatment_id, p.id);
        assert!(view.doctor_template_id.is_none());
    }

    #[test]
    fn assigned_view_carries_row_fields() {
        let p = product("Tretinoin");
        let a = assignment(p.id);
        let view = ProductFormView::from(ResolvedProductForm {
            product: p,
            assignment: Some(a.clone()),
        });
        assert_eq!(view.id, a.id.to_string());
        assert!(view.has_assignment);
        assert_eq!(view.layout_template, "layout_b");
        assert_eq!(view.doctor_template_id, a.doctor_template_id);
        assert_eq!(view.published_url, a.published_url);
    }
}
