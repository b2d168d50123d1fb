//! Repository for `asset_placements` and `stored_assets`.

use schoolsite_core::types::DbId;
use sqlx::PgPool;

use crate::models::asset::{AssetPlacement, NewStoredAsset, PlacementWithAssets, StoredAsset};

const PLACEMENT_COLUMNS: &str = "id, website_id, placement_path, created_at, updated_at";

const ASSET_COLUMNS: &str = "id, placement_id, storage_key, url, original_name, mime_type, \
    size_bytes, width, height, sort_order, created_at";

/// Provides the ordered asset registry for each website placement.
pub struct AssetRepo;

impl AssetRepo {
    /// Return the placement for `(website_id, placement_path)`, creating it if
    /// it does not exist yet.
    pub async fn find_or_create_placement(
        pool: &PgPool,
        website_id: DbId,
        placement_path: &str,
    ) -> Result<AssetPlacement, sqlx::Error> {
        let query = format!(
            "INSERT INTO asset_placements (website_id, placement_path)
             VALUES ($1, $2)
             ON CONFLICT (website_id, placement_path)
             DO UPDATE SET updated_at = NOW()
             RETURNING {PLACEMENT_COLUMNS}"
        );
        sqlx::query_as::<_, AssetPlacement>(&query)
            .bind(website_id)
            .bind(placement_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_placement(
        pool: &PgPool,
        website_id: DbId,
        placement_path: &str,
    ) -> Result<Option<AssetPlacement>, sqlx::Error> {
        let query = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM asset_placements \
             WHERE website_id = $1 AND placement_path = $2"
        );
        sqlx::query_as::<_, AssetPlacement>(&query)
            .bind(website_id)
            .bind(placement_path)
            .fetch_optional(pool)
            .await
    }

    /// Append an asset after the placement's current last one.
    pub async fn append_asset(
        pool: &PgPool,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> Result<StoredAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO stored_assets
                (placement_id, storage_key, url, original_name, mime_type,
                 size_bytes, width, height, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                 (SELECT COALESCE(MAX(sort_order), -1) + 1
                  FROM stored_assets WHERE placement_id = $1))
             RETURNING {ASSET_COLUMNS}"
        );
        sqlx::query_as::<_, StoredAsset>(&query)
            .bind(placement_id)
            .bind(&asset.storage_key)
            .bind(&asset.url)
            .bind(&asset.original_name)
            .bind(&asset.mime_type)
            .bind(asset.size_bytes)
            .bind(asset.width)
            .bind(asset.height)
            .fetch_one(pool)
            .await
    }

    /// Replace every asset of a placement with a single new one.
    ///
    /// Returns the inserted asset and the removed rows, whose blobs the caller
    /// is expected to delete.
    pub async fn replace_assets(
        pool: &PgPool,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> Result<(StoredAsset, Vec<StoredAsset>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let delete = format!(
            "DELETE FROM stored_assets WHERE placement_id = $1 RETURNING {ASSET_COLUMNS}"
        );
        let removed = sqlx::query_as::<_, StoredAsset>(&delete)
            .bind(placement_id)
            .fetch_all(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO stored_assets
                (placement_id, storage_key, url, original_name, mime_type,
                 size_bytes, width, height, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)
             RETURNING {ASSET_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, StoredAsset>(&insert)
            .bind(placement_id)
            .bind(&asset.storage_key)
            .bind(&asset.url)
            .bind(&asset.original_name)
            .bind(&asset.mime_type)
            .bind(asset.size_bytes)
            .bind(asset.width)
            .bind(asset.height)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((inserted, removed))
    }

    /// Assets of a placement in display order.
    pub async fn list_assets(
        pool: &PgPool,
        placement_id: DbId,
    ) -> Result<Vec<StoredAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM stored_assets \
             WHERE placement_id = $1 \
             ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, StoredAsset>(&query)
            .bind(placement_id)
            .fetch_all(pool)
            .await
    }

    /// Reconcile a placement to exactly `remaining_urls`, in that order.
    ///
    /// Rows whose URL is not listed are deleted and returned; the survivors
    /// get `sort_order` equal to their position in `remaining_urls`. URLs that
    /// are not registered under the placement are ignored.
    pub async fn reconcile(
        pool: &PgPool,
        placement_id: DbId,
        remaining_urls: &[String],
    ) -> Result<Vec<StoredAsset>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let delete = format!(
            "DELETE FROM stored_assets \
             WHERE placement_id = $1 AND url <> ALL($2) \
             RETURNING {ASSET_COLUMNS}"
        );
        let removed = sqlx::query_as::<_, StoredAsset>(&delete)
            .bind(placement_id)
            .bind(remaining_urls)
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE stored_assets AS a SET sort_order = (o.ord - 1)::INT \
             FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS o(url, ord) \
             WHERE a.placement_id = $1 AND a.url = o.url",
        )
        .bind(placement_id)
        .bind(remaining_urls)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(removed)
    }

    /// Every placement of a website with its assets, ordered by path.
    pub async fn list_for_website(
        pool: &PgPool,
        website_id: DbId,
    ) -> Result<Vec<PlacementWithAssets>, sqlx::Error> {
        let query = format!(
            "SELECT {PLACEMENT_COLUMNS} FROM asset_placements \
             WHERE website_id = $1 \
             ORDER BY placement_path"
        );
        let placements = sqlx::query_as::<_, AssetPlacement>(&query)
            .bind(website_id)
            .fetch_all(pool)
            .await?;

        let mut out = Vec::with_capacity(placements.len());
        for placement in placements {
            let assets = Self::list_assets(pool, placement.id).await?;
            out.push(PlacementWithAssets { placement, assets });
        }
        Ok(out)
    }
}
