//! Handlers for website versions.
//!
//! Versions are nested under websites:
//! `/websites/{website_id}/versions[/{id}/...]`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use schoolsite_core::types::DbId;
use schoolsite_db::models::site_version::SiteVersion;
use schoolsite_pipeline::orchestrator::{SubmitRequest, VersionOutcome};
use serde::Deserialize;

use super::managed_website;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /websites/{website_id}/versions`.
#[derive(Debug, Deserialize)]
pub struct SubmitVersionRequest {
    /// Switches the website to another theme when present.
    pub theme_id: Option<String>,
    pub data: serde_json::Value,
    pub change_description: Option<String>,
}

/// GET /api/v1/websites/{website_id}/versions
///
/// All versions in ascending order. A website without history gets its
/// initial version created on first listing.
pub async fn list_by_website(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<SiteVersion>>>> {
    managed_website(&state, &user, website_id).await?;
    let versions = state.orchestrator.list_versions(website_id).await?;
    Ok(Json(DataResponse { data: versions }))
}

/// POST /api/v1/websites/{website_id}/versions
pub async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
    Json(input): Json<SubmitVersionRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<VersionOutcome>>)> {
    managed_website(&state, &user, website_id).await?;

    let outcome = state
        .orchestrator
        .submit(SubmitRequest {
            website_id: Some(website_id),
            theme_id: input.theme_id,
            snapshot: input.data,
            change_description: input.change_description,
            name: None,
            user_id: user.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// PUT /api/v1/websites/{website_id}/versions/{id}/activate
///
/// Roll the website to a stored version. No rebuild happens.
pub async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Path((website_id, id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<VersionOutcome>>> {
    managed_website(&state, &user, website_id).await?;
    let outcome = state.orchestrator.activate(website_id, id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/websites/{website_id}/versions/{id}/rebuild
pub async fn rebuild(
    State(state): State<AppState>,
    user: AuthUser,
    Path((website_id, id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<VersionOutcome>>> {
    managed_website(&state, &user, website_id).await?;
    let outcome = state.orchestrator.rebuild(website_id, id).await?;
    Ok(Json(DataResponse { data: outcome }))
}
