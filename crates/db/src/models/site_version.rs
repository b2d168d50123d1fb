//! Site version entity model and DTOs.

use schoolsite_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `site_versions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SiteVersion {
    pub id: DbId,
    pub website_id: DbId,
    pub version_number: i32,
    pub data: serde_json::Value,
    pub change_description: Option<String>,
    pub build_path: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// DTO for creating a new (active) version.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSiteVersion {
    pub website_id: DbId,
    pub data: serde_json::Value,
    pub change_description: Option<String>,
    /// When set, the website's theme is switched in the same transaction.
    pub theme_id: Option<String>,
}
