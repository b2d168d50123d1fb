//! Asset placement and stored asset models.

use schoolsite_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `asset_placements` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AssetPlacement {
    pub id: DbId,
    pub website_id: DbId,
    /// Dotted/indexed content path, e.g. `gallery.photos.images`.
    pub placement_path: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `stored_assets` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct StoredAsset {
    pub id: DbId,
    pub placement_id: DbId,
    pub storage_key: String,
    pub url: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub sort_order: i32,
    pub created_at: Timestamp,
}

/// DTO for registering an uploaded blob under a placement.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStoredAsset {
    pub storage_key: String,
    pub url: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// A placement together with its assets in display order.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementWithAssets {
    #[serde(flatten)]
    pub placement: AssetPlacement,
    pub assets: Vec<StoredAsset>,
}
