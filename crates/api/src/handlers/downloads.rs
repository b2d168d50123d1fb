//! Handler for downloading a website's current build as a zip archive.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use schoolsite_core::error::CoreError;
use schoolsite_core::types::DbId;
use schoolsite_pipeline::archive::zip_directory;

use super::managed_website;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/websites/{website_id}/download
pub async fn download_site(
    State(state): State<AppState>,
    user: AuthUser,
    Path(website_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let website = managed_website(&state, &user, website_id).await?;
    let build_path = website.current_build_path.ok_or(CoreError::NotFound {
        entity: "build",
        id: website_id,
    })?;

    let archive = zip_directory(PathBuf::from(build_path)).await?;
    tracing::info!(website_id, bytes = archive.len(), "Site archive generated");

    let disposition = format!("attachment; filename=\"website-{website_id}.zip\"");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    ))
}
