//! Handlers for the `/admin` resource.
//!
//! All handlers require the `super_admin` role via [`RequireSuperAdmin`].

use axum::extract::{Path, State};
use axum::Json;
use schoolsite_core::error::CoreError;
use schoolsite_core::types::DbId;
use schoolsite_db::models::website::{is_valid_status, Website};
use schoolsite_db::repositories::WebsiteRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::rbac::RequireSuperAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /admin/websites/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    /// Websites with more than one active version.
    pub websites_with_multiple_active: Vec<DbId>,
}

/// GET /api/v1/admin/websites
pub async fn list_websites(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> AppResult<Json<DataResponse<Vec<Website>>>> {
    let websites = WebsiteRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: websites }))
}

/// PUT /api/v1/admin/websites/{id}/status
///
/// Activate or deactivate a website.
pub async fn update_status(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateStatusRequest>,
) -> AppResult<Json<DataResponse<Website>>> {
    let status = input.status.trim();
    if !is_valid_status(status) {
        return Err(CoreError::Validation(format!(
            "Invalid status '{status}'. Must be one of: active, inactive"
        ))
        .into());
    }

    let website = WebsiteRepo::set_status(&state.pool, id, status)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "website",
            id,
        })?;
    tracing::info!(website_id = id, status, admin_id = admin.user_id, "Website status changed");
    Ok(Json(DataResponse { data: website }))
}

/// GET /api/v1/admin/integrity
pub async fn integrity(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> AppResult<Json<DataResponse<IntegrityReport>>> {
    let ids = WebsiteRepo::find_with_multiple_active(&state.pool).await?;
    if !ids.is_empty() {
        tracing::error!(count = ids.len(), "Websites with multiple active versions");
    }
    Ok(Json(DataResponse {
        data: IntegrityReport {
            websites_with_multiple_active: ids,
        },
    }))
}
