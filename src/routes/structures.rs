use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::tenant::ClinicSlug,
    models::{
        auth::AuthenticatedUser,
        structure::{CreateStructureRequest, GlobalFormStructure, ReorderSectionsRequest, SaveStructureRequest},
    },
    services::{metrics, structures::StructureService},
    AppState,
};

fn require_manage(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.role.can_manage_forms() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Managing form structures requires an admin role"))
    }
}

pub async fn list_structures(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<GlobalFormStructure>>, ApiError> {
    let structures = StructureService::list(&state.db, &tenant).await?;
    Ok(Json(structures))
}

pub async fn create_structure(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Json(body): Json<CreateStructureRequest>,
) -> Result<(StatusCode, Json<GlobalFormStructure>), ApiError> {
    require_manage(&user)?;
    let structure = StructureService::create(&state.db, &tenant, &body).await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

pub async fn save_structure(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SaveStructureRequest>,
) -> Result<Json<GlobalFormStructure>, ApiError> {
    require_manage(&user)?;
    let structure = StructureService::save(&state.db, &tenant, id, &body).await?;
    metrics::record_structure_save(&tenant);
    Ok(Json(structure))
}

pub async fn reorder_structure_sections(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReorderSectionsRequest>,
) -> Result<Json<GlobalFormStructure>, ApiError> {
    require_manage(&user)?;
    let structure = StructureService::reorder_sections(&state.db, &tenant, id, &body).await?;
    metrics::record_structure_save(&tenant);
    Ok(Json(structure))
}

pub async fn delete_structure(
    State(state): State<AppState>,
    ClinicSlug(tenant): ClinicSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_manage(&user)?;
    StructureService::delete(&state.db, &tenant, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
