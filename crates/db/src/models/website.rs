//! Website entity model and DTOs.

use schoolsite_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const WEBSITE_STATUS_ACTIVE: &str = "active";
pub const WEBSITE_STATUS_INACTIVE: &str = "inactive";

/// Name given to websites created without one.
pub const DEFAULT_WEBSITE_NAME: &str = "Untitled site";

/// A row from the `websites` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Website {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub theme_id: String,
    /// Number of the active version. `None` until the first version exists.
    pub current_version: Option<i32>,
    /// Copy of the active version's snapshot.
    pub data: serde_json::Value,
    pub status: String,
    /// Output directory of the last successful build of the active content.
    pub current_build_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a website record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebsite {
    pub owner_id: DbId,
    pub name: Option<String>,
    pub theme_id: String,
    pub data: serde_json::Value,
}

/// Valid values for `websites.status`.
pub fn is_valid_status(status: &str) -> bool {
    status == WEBSITE_STATUS_ACTIVE || status == WEBSITE_STATUS_INACTIVE
}
