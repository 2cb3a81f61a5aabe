use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    db::tenant::provision_clinic_schema,
    error::ApiError,
    middleware::{super_admin::SuperAdminAuth, tenant::is_valid_slug},
    models::clinic::{Clinic, CreateClinicRequest, UpdateClinicRequest},
    AppState,
};

// ─── Clinic registry (super-admin) ────────────────────────────────────────────

pub async fn list_clinics(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Vec<Clinic>>, ApiError> {
    let clinics = sqlx::query_as::<_, Clinic>("SELECT * FROM clinics ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(clinics))
}

/// Register a clinic and provision its schema. The slug is permanent; it
/// names the Postgres schema every domain table lives in.
pub async fn create_clinic(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Json(body): Json<CreateClinicRequest>,
) -> Result<(StatusCode, Json<Clinic>), ApiError> {
    if !is_valid_slug(&body.slug) {
        return Err(ApiError::validation(
            "Slug must be 2-63 lowercase letters, digits or hyphens",
        ));
    }
    if let Some(public_slug) = &body.public_slug {
        if !is_valid_slug(public_slug) {
            return Err(ApiError::validation("Invalid public slug"));
        }
    }

    let clinic = sqlx::query_as::<_, Clinic>(
        "INSERT INTO clinics (slug, name, public_slug, contact_email)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&body.slug)
    .bind(&body.name)
    .bind(&body.public_slug)
    .bind(&body.contact_email)
    .fetch_one(&state.db)
    .await?;

    provision_clinic_schema(&state.db, &body.slug)
        .await
        .map_err(|e| ApiError::Internal(e.context("Schema provisioning failed")))?;

    Ok((StatusCode::CREATED, Json(clinic)))
}

pub async fn update_clinic(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Path(slug): Path<String>,
    Json(body): Json<UpdateClinicRequest>,
) -> Result<Json<Clinic>, ApiError> {
    if let Some(public_slug) = &body.public_slug {
        if !is_valid_slug(public_slug) {
            return Err(ApiError::validation("Invalid public slug"));
        }
    }

    sqlx::query_as::<_, Clinic>(
        "UPDATE clinics SET
           name = COALESCE($2, name),
           public_slug = COALESCE($3, public_slug),
           contact_email = COALESCE($4, contact_email),
           is_active = COALESCE($5, is_active),
           updated_at = NOW()
         WHERE slug = $1
         RETURNING *",
    )
    .bind(&slug)
    .bind(&body.name)
    .bind(&body.public_slug)
    .bind(&body.contact_email)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or(ApiError::NotFound("clinic"))
}
