use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::tenant::ClinicSlug,
    models::{
        auth::AuthenticatedUser,
        template::{CreateTemplateRequest, FormSectionTemplate, TemplateFilter, UpdateTemplateSchemaRequest},
    },
    services::templates::TemplateService,
    AppState,
};

fn require_manage(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.role.can_manage_forms() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Managing templates requires an admin role"))
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    _user: AuthenticatedUser,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<Vec<FormSectionTemplate>>, ApiError> {
    let templates = TemplateService::list(&state.db, &tenant, &filter).await?;
    Ok(Json(templates))
}

pub async fn get_template(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FormSectionTemplate>, ApiError> {
    let template = TemplateService::get(&state.db, &tenant, id).await?;
    Ok(Json(template))
}

pub async fn create_template(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Json(body): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<FormSectionTemplate>), ApiError> {
    require_manage(&user)?;
    let template = TemplateService::create(&state.db, &tenant, &body).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template_schema(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTemplateSchemaRequest>,
) -> Result<Json<FormSectionTemplate>, ApiError> {
    require_manage(&user)?;
    let template = TemplateService::update_schema(&state.db, &tenant, id, &body).await?;
    Ok(Json(template))
}

pub async fn deactivate_template(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FormSectionTemplate>, ApiError> {
    require_manage(&user)?;
    let template = TemplateService::deactivate(&state.db, &tenant, id).await?;
    Ok(Json(template))
}
