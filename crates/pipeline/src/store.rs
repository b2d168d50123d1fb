//! Persistence seam for the pipeline.
//!
//! The orchestrator and asset registry talk to [`SiteStore`] rather than to
//! the repositories directly, which keeps them testable without Postgres.
//! [`PgSiteStore`] is the production implementation.

use async_trait::async_trait;
use schoolsite_core::types::DbId;
use schoolsite_db::models::asset::{
    AssetPlacement, NewStoredAsset, PlacementWithAssets, StoredAsset,
};
use schoolsite_db::models::site_version::{CreateSiteVersion, SiteVersion};
use schoolsite_db::models::website::{CreateWebsite, Website};
use schoolsite_db::repositories::{AssetRepo, SiteVersionRepo, WebsiteRepo};
use schoolsite_db::DbPool;

use crate::error::PipelineResult;

/// Website, version and asset persistence used by the pipeline.
///
/// Implementations must uphold the version invariants: numbers are
/// `max + 1` per website starting at 1, and at most one version per website
/// is active after every call.
#[async_trait]
pub trait SiteStore: Send + Sync + 'static {
    async fn create_website(&self, input: &CreateWebsite) -> PipelineResult<Website>;

    async fn find_website(&self, id: DbId) -> PipelineResult<Option<Website>>;

    /// Remove a website together with its versions and asset rows. Returns
    /// whether a row was deleted.
    async fn delete_website(&self, id: DbId) -> PipelineResult<bool>;

    /// Atomically create the next version, make it active and point the
    /// website at it.
    async fn create_active_version(&self, input: &CreateSiteVersion)
        -> PipelineResult<SiteVersion>;

    async fn find_version(&self, id: DbId) -> PipelineResult<Option<SiteVersion>>;

    /// Versions of a website in ascending number order.
    async fn versions(&self, website_id: DbId) -> PipelineResult<Vec<SiteVersion>>;

    /// Move the active marker to `version_id`. `None` if the version does not
    /// belong to the website.
    async fn activate_version(
        &self,
        website_id: DbId,
        version_id: DbId,
    ) -> PipelineResult<Option<SiteVersion>>;

    /// Store a completed build's output path.
    async fn record_build(
        &self,
        version_id: DbId,
        build_path: &str,
    ) -> PipelineResult<Option<SiteVersion>>;

    /// Demote all but the highest-numbered active version.
    async fn repair_active(&self, website_id: DbId) -> PipelineResult<u64>;

    async fn placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<Option<AssetPlacement>>;

    async fn ensure_placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<AssetPlacement>;

    async fn append_asset(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<StoredAsset>;

    /// Replace the placement's assets; returns the new asset and the removed ones.
    async fn replace_assets(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<(StoredAsset, Vec<StoredAsset>)>;

    /// Keep exactly `remaining_urls` in that order; returns the removed assets.
    async fn reconcile_assets(
        &self,
        placement_id: DbId,
        remaining_urls: &[String],
    ) -> PipelineResult<Vec<StoredAsset>>;

    async fn assets(&self, placement_id: DbId) -> PipelineResult<Vec<StoredAsset>>;

    async fn placements(&self, website_id: DbId) -> PipelineResult<Vec<PlacementWithAssets>>;
}

/// [`SiteStore`] backed by the Postgres repositories.
#[derive(Debug, Clone)]
pub struct PgSiteStore {
    pool: DbPool,
}

impl PgSiteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SiteStore for PgSiteStore {
    async fn create_website(&self, input: &CreateWebsite) -> PipelineResult<Website> {
        Ok(WebsiteRepo::create(&self.pool, input).await?)
    }

    async fn find_website(&self, id: DbId) -> PipelineResult<Option<Website>> {
        Ok(WebsiteRepo::find_by_id(&self.pool, id).await?)
    }

    async fn delete_website(&self, id: DbId) -> PipelineResult<bool> {
        Ok(WebsiteRepo::delete(&self.pool, id).await?)
    }

    async fn create_active_version(
        &self,
        input: &CreateSiteVersion,
    ) -> PipelineResult<SiteVersion> {
        Ok(SiteVersionRepo::create_as_active(&self.pool, input).await?)
    }

    async fn find_version(&self, id: DbId) -> PipelineResult<Option<SiteVersion>> {
        Ok(SiteVersionRepo::find_by_id(&self.pool, id).await?)
    }

    async fn versions(&self, website_id: DbId) -> PipelineResult<Vec<SiteVersion>> {
        Ok(SiteVersionRepo::list_by_website(&self.pool, website_id).await?)
    }

    async fn activate_version(
        &self,
        website_id: DbId,
        version_id: DbId,
    ) -> PipelineResult<Option<SiteVersion>> {
        Ok(SiteVersionRepo::set_active(&self.pool, website_id, version_id).await?)
    }

    async fn record_build(
        &self,
        version_id: DbId,
        build_path: &str,
    ) -> PipelineResult<Option<SiteVersion>> {
        Ok(SiteVersionRepo::record_build(&self.pool, version_id, build_path).await?)
    }

    async fn repair_active(&self, website_id: DbId) -> PipelineResult<u64> {
        Ok(SiteVersionRepo::repair_active(&self.pool, website_id).await?)
    }

    async fn placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<Option<AssetPlacement>> {
        Ok(AssetRepo::find_placement(&self.pool, website_id, placement_path).await?)
    }

    async fn ensure_placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<AssetPlacement> {
        Ok(AssetRepo::find_or_create_placement(&self.pool, website_id, placement_path).await?)
    }

    async fn append_asset(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<StoredAsset> {
        Ok(AssetRepo::append_asset(&self.pool, placement_id, asset).await?)
    }

    async fn replace_assets(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<(StoredAsset, Vec<StoredAsset>)> {
        Ok(AssetRepo::replace_assets(&self.pool, placement_id, asset).await?)
    }

    async fn reconcile_assets(
        &self,
        placement_id: DbId,
        remaining_urls: &[String],
    ) -> PipelineResult<Vec<StoredAsset>> {
        Ok(AssetRepo::reconcile(&self.pool, placement_id, remaining_urls).await?)
    }

    async fn assets(&self, placement_id: DbId) -> PipelineResult<Vec<StoredAsset>> {
        Ok(AssetRepo::list_assets(&self.pool, placement_id).await?)
    }

    async fn placements(&self, website_id: DbId) -> PipelineResult<Vec<PlacementWithAssets>> {
        Ok(AssetRepo::list_for_website(&self.pool, website_id).await?)
    }
}
