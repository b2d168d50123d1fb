pub mod admin;
pub mod health;
pub mod websites;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{preview, themes, uploads};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /themes                                          list
/// /themes/{id}                                     schema
///
/// /websites                                        list own, submit (POST)
/// /websites/{id}                                   get
/// /websites/{id}/versions                          list, submit (POST)
/// /websites/{id}/versions/{vid}/activate           activate (PUT)
/// /websites/{id}/versions/{vid}/rebuild            rebuild (POST)
/// /websites/{id}/assets                            list, reconcile (PUT)
/// /websites/{id}/download                          zip of current build
/// /websites/{id}/preview                           start preview (POST)
///
/// /preview                                         current, stop (DELETE)
/// /uploads                                         image upload (multipart)
///
/// /admin/websites                                  all websites (super-admin)
/// /admin/websites/{id}/status                      set status (PUT)
/// /admin/integrity                                 active-version check
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/themes", get(themes::list_themes))
        .route("/themes/{id}", get(themes::get_theme))
        .nest("/websites", websites::router())
        .route(
            "/preview",
            get(preview::current_preview).delete(preview::stop_preview),
        )
        .route(
            "/uploads",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::UPLOAD_BODY_LIMIT)),
        )
        .nest("/admin", admin::router())
}
