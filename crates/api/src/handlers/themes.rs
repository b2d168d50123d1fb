//! Handlers for the `/themes` resource.

use axum::extract::{Path, State};
use axum::Json;
use schoolsite_core::theme::{ThemeSchema, ThemeSummary};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/themes
pub async fn list_themes(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<ThemeSummary>>>> {
    let themes = state.orchestrator.themes().list().await?;
    Ok(Json(DataResponse { data: themes }))
}

/// GET /api/v1/themes/{id}
///
/// Full schema of one theme: pages, sections and field definitions.
pub async fn get_theme(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<ThemeSchema>>> {
    let schema = state.orchestrator.themes().schema(&id).await?;
    Ok(Json(DataResponse { data: schema }))
}
