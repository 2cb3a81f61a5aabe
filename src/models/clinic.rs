use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registry row in the public schema. Domain tables live in the per-clinic
/// schema derived from `slug`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Clinic {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Patient-facing subdomain for published form URLs; None until the
    /// clinic configures its storefront.
    pub public_slug: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClinicRequest {
    pub slug: String,
    pub name: String,
    pub public_slug: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClinicRequest {
    pub name: Option<String>,
    pub public_slug: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: Option<bool>,
}
