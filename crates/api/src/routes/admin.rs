//! Super-admin routes mounted at `/admin`.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// ```text
/// GET /websites               list_websites
/// PUT /websites/{id}/status   update_status
/// GET /integrity              integrity
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/websites", get(admin::list_websites))
        .route("/websites/{id}/status", put(admin::update_status))
        .route("/integrity", get(admin::integrity))
}
