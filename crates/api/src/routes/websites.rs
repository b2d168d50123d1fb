//! Route definitions for websites and their nested resources.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{assets, downloads, preview, versions, websites};
use crate::state::AppState;

/// Routes mounted at `/websites`.
///
/// ```text
/// GET    /                              list_mine
/// POST   /                              submit
/// GET    /{id}                          get_by_id
/// GET    /{id}/versions                 versions::list_by_website
/// POST   /{id}/versions                 versions::submit
/// PUT    /{id}/versions/{vid}/activate  versions::activate
/// POST   /{id}/versions/{vid}/rebuild   versions::rebuild
/// GET    /{id}/assets                   assets::list_by_website
/// PUT    /{id}/assets                   assets::reconcile
/// GET    /{id}/download                 downloads::download_site
/// POST   /{id}/preview                  preview::start_preview
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(websites::list_mine).post(websites::submit))
        .route("/{id}", get(websites::get_by_id))
        .route(
            "/{id}/versions",
            get(versions::list_by_website).post(versions::submit),
        )
        .route("/{id}/versions/{vid}/activate", put(versions::activate))
        .route("/{id}/versions/{vid}/rebuild", post(versions::rebuild))
        .route(
            "/{id}/assets",
            get(assets::list_by_website).put(assets::reconcile),
        )
        .route("/{id}/download", get(downloads::download_site))
        .route("/{id}/preview", post(preview::start_preview))
}
