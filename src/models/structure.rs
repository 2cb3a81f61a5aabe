use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The section kinds a clinic's form flow is assembled from. Closed set:
/// unknown kinds are rejected at deserialization instead of being carried
/// around as strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    ProductQuestions,
    CategoryQuestions,
    AccountCreation,
    Checkout,
    Custom,
}

impl SectionType {
    /// Account creation and checkout can never be disabled; a form without
    /// them cannot complete a purchase.
    pub fn is_locked(self) -> bool {
        matches!(self, SectionType::AccountCreation | SectionType::Checkout)
    }
}

/// One entry of a structure's ordered section list (stored as JSONB).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSection {
    /// Stable slug referenced by the storefront renderer, e.g. "product".
    pub id: String,
    pub section_type: SectionType,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 1-based position; re-indexed densely on every save.
    pub order: i32,
    pub enabled: bool,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlobalFormStructure {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sections: sqlx::types::Json<Vec<FormSection>>,
    pub is_default: bool,
    /// Optimistic-concurrency token; +1 on every save.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStructureRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub sections: Vec<FormSection>,
}

/// Body for PUT /form-structures/{id}. `version` must match the stored row
/// or the save is rejected as a concurrent modification.
#[derive(Debug, Deserialize)]
pub struct SaveStructureRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub version: i32,
    pub sections: Vec<FormSection>,
}

/// Body for POST /form-structures/{id}/reorder.
#[derive(Debug, Deserialize)]
pub struct ReorderSectionsRequest {
    pub from_index: usize,
    pub to_index: usize,
    pub version: i32,
}
