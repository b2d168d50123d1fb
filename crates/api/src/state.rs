use std::sync::Arc;

use schoolsite_pipeline::preview::PreviewServer;
use schoolsite_pipeline::{Orchestrator, PgSiteStore};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: schoolsite_db::DbPool,
    /// Server configuration (JWT secret, storage settings).
    pub config: Arc<ServerConfig>,
    /// Version/build pipeline; owns the theme catalog and asset registry.
    pub orchestrator: Arc<Orchestrator<PgSiteStore>>,
    /// The single preview slot.
    pub preview: Arc<PreviewServer>,
}
