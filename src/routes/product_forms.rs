use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::tenant::ClinicSlug,
    models::{
        assignment::{
            DetachSlotRequest, FormState, FormStateQuery, ImportTemplateRequest, LockRequest,
            ProductFormView, TenantProductFormAssignment,
        },
        auth::AuthenticatedUser,
        product::PageQuery,
    },
    services::{
        assignments::AssignmentService, import::ImportService, publish::PublishService,
    },
    AppState,
};

fn require_manage(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.role.can_manage_forms() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Managing product forms requires an admin role"))
    }
}

/// The merged admin view: one entry per catalog product on the page,
/// placeholders included.
pub async fn list_product_forms(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    _user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let (resolved, pagination) = AssignmentService::resolve(&state.db, &tenant, &query).await?;
    let items: Vec<ProductFormView> = resolved.into_iter().map(ProductFormView::from).collect();
    Ok(Json(json!({ "items": items, "pagination": pagination })))
}

pub async fn get_form_state(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    _user: AuthenticatedUser,
    Path(treatment_id): Path<Uuid>,
    Query(query): Query<FormStateQuery>,
) -> Result<Json<FormState>, ApiError> {
    let form_state =
        AssignmentService::form_state(&state.db, &tenant, treatment_id, query.section_type).await?;
    Ok(Json(form_state))
}

pub async fn import_template(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(treatment_id): Path<Uuid>,
    Json(body): Json<ImportTemplateRequest>,
) -> Result<Json<TenantProductFormAssignment>, ApiError> {
    require_manage(&user)?;
    let assignment = ImportService::import(&state.db, &tenant, treatment_id, &body).await?;
    Ok(Json(assignment))
}

pub async fn detach_slot(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(treatment_id): Path<Uuid>,
    Json(body): Json<DetachSlotRequest>,
) -> Result<Json<TenantProductFormAssignment>, ApiError> {
    require_manage(&user)?;
    let assignment =
        ImportService::detach(&state.db, &tenant, treatment_id, body.section_type).await?;
    Ok(Json(assignment))
}

pub async fn publish_form(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(treatment_id): Path<Uuid>,
) -> Result<Json<TenantProductFormAssignment>, ApiError> {
    require_manage(&user)?;
    let assignment =
        PublishService::publish(&state.db, &state.config, &tenant, treatment_id).await?;
    Ok(Json(assignment))
}

pub async fn lock_form(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(treatment_id): Path<Uuid>,
    Json(body): Json<LockRequest>,
) -> Result<Json<TenantProductFormAssignment>, ApiError> {
    require_manage(&user)?;
    let assignment = PublishService::lock(&state.db, &tenant, treatment_id, body.until).await?;
    Ok(Json(assignment))
}
