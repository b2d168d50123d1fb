//! Handlers for the uploaded assets of a website.

use axum::extract::{Path, State};
use axum::Json;
use schoolsite_core::content::FieldPath;
use schoolsite_core::types::DbId;
use schoolsite_db::models::asset::{PlacementWithAssets, StoredAsset};
use serde::{Deserialize, Serialize};

use super::managed_website;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /websites/{website_id}/assets`.
#[derive(Debug, Deserialize)]
pub struct ReconcileAssetsRequest {
    pub placement_path: String,
    /// URLs that remain, in display order. Everything else is removed.
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileAssetsResponse {
    pub placement_path: String,
    pub assets: Vec<StoredAsset>,
    pub removed: Vec<StoredAsset>,
}

/// GET /api/v1/websites/{website_id}/assets
pub async fn list_by_website(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<PlacementWithAssets>>>> {
    managed_website(&state, &user, website_id).await?;
    let placements = state
        .orchestrator
        .assets()
        .list_placements(website_id)
        .await?;
    Ok(Json(DataResponse { data: placements }))
}

/// PUT /api/v1/websites/{website_id}/assets
///
/// Keep exactly the listed URLs under a placement, in the given order, and
/// delete the blobs of everything dropped.
pub async fn reconcile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
    Json(input): Json<ReconcileAssetsRequest>,
) -> AppResult<Json<DataResponse<ReconcileAssetsResponse>>> {
    managed_website(&state, &user, website_id).await?;
    let placement_path = FieldPath::parse(&input.placement_path)?.to_string();

    let registry = state.orchestrator.assets();
    let removed = registry
        .remove_assets(website_id, &placement_path, &input.urls)
        .await?;
    let assets = registry.assets_at(website_id, &placement_path).await?;

    Ok(Json(DataResponse {
        data: ReconcileAssetsResponse {
            placement_path,
            assets,
            removed,
        },
    }))
}
