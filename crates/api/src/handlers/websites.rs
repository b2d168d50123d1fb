//! Handlers for the `/websites` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use schoolsite_core::types::DbId;
use schoolsite_db::models::website::Website;
use schoolsite_db::repositories::WebsiteRepo;
use schoolsite_pipeline::orchestrator::{SubmitRequest, VersionOutcome};
use serde::Deserialize;

use super::managed_website;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /websites`.
#[derive(Debug, Deserialize)]
pub struct SubmitWebsiteRequest {
    /// Absent for a first-time generation.
    pub website_id: Option<DbId>,
    pub theme_id: Option<String>,
    pub name: Option<String>,
    pub data: serde_json::Value,
    pub change_description: Option<String>,
}

/// POST /api/v1/websites
///
/// Validate the submitted content, create a new version and build it. Creates
/// the website when `website_id` is absent.
pub async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<SubmitWebsiteRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<VersionOutcome>>)> {
    if let Some(id) = input.website_id {
        managed_website(&state, &user, id).await?;
    }

    let outcome = state
        .orchestrator
        .submit(SubmitRequest {
            website_id: input.website_id,
            theme_id: input.theme_id,
            snapshot: input.data,
            change_description: input.change_description,
            name: input.name,
            user_id: user.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// GET /api/v1/websites
///
/// Websites owned by the caller.
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<Website>>>> {
    let websites = WebsiteRepo::list_by_owner(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: websites }))
}

/// GET /api/v1/websites/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Website>>> {
    let website = managed_website(&state, &user, id).await?;
    Ok(Json(DataResponse { data: website }))
}
