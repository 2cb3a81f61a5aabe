use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// The three assignment slots a template can target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSectionType {
    Personalization,
    Account,
    Doctor,
}

impl TemplateSectionType {
    /// Column of `product_form_assignments` holding this slot's template id.
    pub fn assignment_column(self) -> &'static str {
        match self {
            TemplateSectionType::Personalization => "personalization_template_id",
            TemplateSectionType::Account => "account_template_id",
            TemplateSectionType::Doctor => "doctor_template_id",
        }
    }

    pub fn all() -> [TemplateSectionType; 3] {
        [
            TemplateSectionType::Personalization,
            TemplateSectionType::Account,
            TemplateSectionType::Doctor,
        ]
    }
}

impl std::fmt::Display for TemplateSectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TemplateSectionType::Personalization => "personalization",
            TemplateSectionType::Account => "account",
            TemplateSectionType::Doctor => "doctor",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TemplateSectionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personalization" => Ok(TemplateSectionType::Personalization),
            "account" => Ok(TemplateSectionType::Account),
            "doctor" => Ok(TemplateSectionType::Doctor),
            _ => Err(anyhow::anyhow!("Unknown section type: {s}")),
        }
    }
}

/// One step of a template's question tree. The engine only understands this
/// much of the schema; `extra` carries the question payload and any other
/// keys untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormStep {
    pub id: String,
    pub number: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// DB row struct — section_type is fetched as TEXT to avoid the
/// schema-qualified enum OID mismatch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormSectionTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Stored as TEXT in queries (section_type::TEXT).
    pub section_type: String,
    pub category: Option<String>,
    /// Some(..) scopes the template to one product; such rows are the
    /// materialized per-product form content and stay out of library listings.
    pub treatment_id: Option<Uuid>,
    /// Opaque question tree; only the top-level "steps" array is interpreted.
    pub schema: Value,
    /// Monotonic; +1 on every schema edit, never decreases.
    pub version: i32,
    /// Marks the seeded per-clinic default for its section type.
    pub is_default: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSectionTemplate {
    pub fn section_type(&self) -> Option<TemplateSectionType> {
        self.section_type.parse().ok()
    }

    pub fn steps(&self) -> Vec<FormStep> {
        steps_of(&self.schema)
    }
}

/// Extract the step list from a question schema. Tolerant: a missing or
/// malformed "steps" key reads as an empty form, and steps that fail to
/// parse are skipped rather than failing the whole schema.
pub fn steps_of(schema: &Value) -> Vec<FormStep> {
    schema
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(|s| serde_json::from_value(s.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Write a step list back into a schema, preserving every other top-level
/// key. A non-object schema is replaced by a fresh object.
pub fn with_steps(schema: &Value, steps: &[FormStep]) -> Value {
    let mut root = match schema {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let rendered = steps
        .iter()
        .filter_map(|s| serde_json::to_value(s).ok())
        .collect();
    root.insert("steps".to_string(), Value::Array(rendered));
    Value::Object(root)
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub section_type: TemplateSectionType,
    pub category: Option<String>,
    pub treatment_id: Option<Uuid>,
    pub schema: Option<Value>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Body for PATCH /form-templates/{id}/schema.
#[derive(Debug, Deserialize)]
pub struct UpdateTemplateSchemaRequest {
    pub schema: Value,
}

/// Query params for GET /form-templates.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateFilter {
    pub section_type: Option<TemplateSectionType>,
    pub category: Option<String>,
    pub treatment_id: Option<Uuid>,
}
