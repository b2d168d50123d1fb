//! Handlers for the preview server.
//!
//! One preview runs at a time; starting another replaces it.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::Json;
use schoolsite_core::error::CoreError;
use schoolsite_core::types::DbId;
use schoolsite_pipeline::preview::PreviewInfo;

use super::managed_website;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/websites/{website_id}/preview
///
/// Serve the website's current build on the preview address.
pub async fn start_preview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PreviewInfo>>> {
    let website = managed_website(&state, &user, website_id).await?;
    let build_path = website.current_build_path.ok_or(CoreError::NotFound {
        entity: "build",
        id: website_id,
    })?;

    let info = state
        .preview
        .start(website_id, PathBuf::from(build_path))
        .await?;
    Ok(Json(DataResponse { data: info }))
}

/// GET /api/v1/preview
pub async fn current_preview(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<Option<PreviewInfo>>>> {
    Ok(Json(DataResponse {
        data: state.preview.current().await,
    }))
}

/// DELETE /api/v1/preview
///
/// Stop the running preview. Only its website's owner or a super-admin may
/// stop it. Stopping when nothing runs is not an error.
pub async fn stop_preview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Option<PreviewInfo>>>> {
    if let Some(current) = state.preview.current().await {
        managed_website(&state, &user, current.website_id).await?;
    }
    Ok(Json(DataResponse {
        data: state.preview.stop().await,
    }))
}
