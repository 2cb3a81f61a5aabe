use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::product::Product;
use super::template::TemplateSectionType;

/// DB row struct — layout_template is fetched as TEXT to avoid the
/// schema-qualified enum OID mismatch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantProductFormAssignment {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub doctor_template_id: Option<Uuid>,
    pub personalization_template_id: Option<Uuid>,
    pub account_template_id: Option<Uuid>,
    /// Stored as TEXT in queries (layout_template::TEXT).
    pub layout_template: String,
    pub theme_id: Option<Uuid>,
    /// Edit freeze horizon; template-binding mutations are refused until it
    /// passes. Publishing stays allowed.
    pub locked_until: Option<DateTime<Utc>>,
    /// Stable once set; publishing never regenerates it.
    pub published_url: Option<String>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantProductFormAssignment {
    pub fn slot(&self, section_type: TemplateSectionType) -> Option<Uuid> {
        match section_type {
            TemplateSectionType::Personalization => self.personalization_template_id,
            TemplateSectionType::Account => self.account_template_id,
            TemplateSectionType::Doctor => self.doctor_template_id,
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Merge mode for POST /product-forms/{id}/import. Forced to `replace` when
/// the target slot has no steps yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Replace,
    Append,
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Append => write!(f, "append"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportTemplateRequest {
    pub template_id: Uuid,
    pub section_type: TemplateSectionType,
    pub mode: ImportMode,
    /// Allow importing a soft-deleted template.
    #[serde(default)]
    pub allow_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct DetachSlotRequest {
    pub section_type: TemplateSectionType,
}

/// Body for POST /product-forms/{id}/lock. `until: null` clears the lock.
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub until: Option<DateTime<Utc>>,
}

/// Query params for GET /product-forms/{id}/state.
#[derive(Debug, Deserialize)]
pub struct FormStateQuery {
    pub section_type: TemplateSectionType,
}

/// Current content of one assignment slot, as the import flow sees it.
#[derive(Debug, Clone, Serialize)]
pub struct FormState {
    pub section_type: TemplateSectionType,
    pub template_id: Option<Uuid>,
    pub step_count: usize,
    pub has_steps: bool,
}

/// Internal merge result: the catalog row plus the assignment when one
/// exists. No placeholder ids in here; those are materialized only when
/// converting to the wire view.
#[derive(Debug, Clone)]
pub struct ResolvedProductForm {
    pub product: Product,
    pub assignment: Option<TenantProductFormAssignment>,
}

/// Wire shape of one merged catalog entry. Products without an assignment
/// get a synthetic `placeholder-{treatment_id}` id and the layout default so
/// the client renders a uniform grid.
#[derive(Debug, Clone, Serialize)]
pub struct ProductFormView {
    pub id: String,
    pub treatment_id: Uuid,
    pub product_name: String,
    pub product_slug: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub product_active: bool,
    pub has_assignment: bool,
    pub doctor_template_id: Option<Uuid>,
    pub personalization_template_id: Option<Uuid>,
    pub account_template_id: Option<Uuid>,
    pub layout_template: String,
    pub theme_id: Option<Uuid>,
    pub locked_until: Option<DateTime<Utc>>,
    pub published_url: Option<String>,
    pub last_published_at: Option<DateTime<Utc>>,
}

impl From<ResolvedProductForm> for ProductFormView {
    fn from(resolved: ResolvedProductForm) -> Self {
        let ResolvedProductForm { product, assignment } = resolved;
        match assignment {
            Some(a) => Self {
                id: a.id.to_string(),
                treatment_id: product.id,
                product_name: product.name,
                product_slug: product.slug,
                category: product.category,
                image_url: product.image_url,
                product_active: product.is_active,
                has_assignment: true,
                doctor_template_id: a.doctor_template_id,
                personalization_template_id: a.personalization_template_id,
                account_template_id: a.account_template_id,
                layout_template: a.layout_template,
                theme_id: a.theme_id,
                locked_until: a.locked_until,
                published_url: a.published_url,
                last_published_at: a.last_published_at,
            },
            None => Self {
                id: format!("placeholder-{}", product.id),
                treatment_id: product.id,
                product_name: product.name,
                product_slug: product.slug,
                category: product.category,
                image_url: product.image_url,
                product_active: product.is_active,
                has_assignment: false,
                doctor_template_id: None,
                personalization_template_id: None,
                account_template_id: None,
                layout_template: "layout_a".to_string(),
                theme_id: None,
                locked_until: None,
                published_url: None,
                last_published_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment() -> TenantProductFormAssignment {
        TenantProductFormAssignment {
            id: Uuid::new_v4(),
            treatment_id: Uuid::new_v4(),
            doctor_template_id: Some(Uuid::new_v4()),
            personalization_template_id: Some(Uuid::new_v4()),
            account_template_id: Some(Uuid::new_v4()),
            layout_template: "layout_a".to_string(),
            theme_id: None,
            locked_until: None,
            published_url: None,
            last_published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn each_section_type_reads_its_own_slot() {
        let a = assignment();
        assert_eq!(
            a.slot(TemplateSectionType::Personalization),
            a.personalization_template_id
        );
        assert_eq!(a.slot(TemplateSectionType::Account), a.account_template_id);
        assert_eq!(a.slot(TemplateSectionType::Doctor), a.doctor_template_id);

        let columns: Vec<_> = TemplateSectionType::all()
            .into_iter()
            .map(|t| t.assignment_column())
            .collect();
        assert_eq!(
            columns,
            vec![
                "personalization_template_id",
                "account_template_id",
                "doctor_template_id"
            ]
        );
    }

    #[test]
    fn lock_is_only_effective_while_in_the_future() {
        let now = Utc::now();
        let mut a = assignment();
        assert!(!a.is_locked_at(now));

        a.locked_until = Some(now + Duration::hours(1));
        assert!(a.is_locked_at(now));

        a.locked_until = Some(now - Duration::hours(1));
        assert!(!a.is_locked_at(now));
    }
}
