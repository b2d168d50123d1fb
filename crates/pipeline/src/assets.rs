//! Asset registry: ordered uploaded images per content placement.
//!
//! Blob bytes live in a [`BlobStore`]; the registry rows (placement + ordered
//! stored assets) live in the [`SiteStore`]. Row changes are authoritative;
//! blob deletions are best effort and only logged when they fail.

use std::collections::HashMap;
use std::sync::Arc;

use schoolsite_core::content::{self, FieldPath};
use schoolsite_core::imaging::{self, NormalizedImage, OUTPUT_MIME};
use schoolsite_core::storage::{self, BlobStore, DeleteOutcome, StoredBlob};
use schoolsite_core::types::DbId;
use schoolsite_db::models::asset::{NewStoredAsset, PlacementWithAssets, StoredAsset};
use serde_json::Value;

use crate::error::PipelineResult;
use crate::store::SiteStore;

/// How a new asset joins its placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterMode {
    /// Add after the existing assets (multi-image fields).
    Append,
    /// Drop the existing assets first (single-image fields).
    Replace,
}

/// Where an upload ended up.
#[derive(Debug, Clone)]
pub enum UploadTarget {
    /// Parked in the temporary area until the content is submitted.
    Temporary(StoredBlob),
    /// Stored and registered under a website placement.
    Registered(StoredAsset),
}

impl UploadTarget {
    pub fn url(&self) -> &str {
        match self {
            Self::Temporary(blob) => &blob.url,
            Self::Registered(asset) => &asset.url,
        }
    }
}

pub struct AssetRegistry<S> {
    store: Arc<S>,
    blobs: Arc<dyn BlobStore>,
}

impl<S> Clone for AssetRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
        }
    }
}

impl<S: SiteStore> AssetRegistry<S> {
    pub fn new(store: Arc<S>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Add `asset` to the placement at `placement_path`, creating the
    /// placement on first use. In [`RegisterMode::Replace`] the previous
    /// assets are removed and their blobs deleted.
    pub async fn register_asset(
        &self,
        website_id: DbId,
        placement_path: &str,
        asset: &NewStoredAsset,
        mode: RegisterMode,
    ) -> PipelineResult<StoredAsset> {
        let placement = self.store.ensure_placement(website_id, placement_path).await?;
        match mode {
            RegisterMode::Append => self.store.append_asset(placement.id, asset).await,
            RegisterMode::Replace => {
                let (inserted, removed) = self.store.replace_assets(placement.id, asset).await?;
                self.delete_blobs(&removed).await;
                Ok(inserted)
            }
        }
    }

    /// Reconcile a placement to exactly `remaining_urls`, in that order.
    ///
    /// Everything else under the placement is unregistered and its blob
    /// deleted. Returns the removed assets; an unknown placement removes
    /// nothing.
    pub async fn remove_assets(
        &self,
        website_id: DbId,
        placement_path: &str,
        remaining_urls: &[String],
    ) -> PipelineResult<Vec<StoredAsset>> {
        let Some(placement) = self.store.placement(website_id, placement_path).await? else {
            return Ok(Vec::new());
        };
        let removed = self
            .store
            .reconcile_assets(placement.id, remaining_urls)
            .await?;
        self.delete_blobs(&removed).await;

        tracing::info!(
            website_id,
            placement = %placement_path,
            removed = removed.len(),
            remaining = remaining_urls.len(),
            "Reconciled asset placement",
        );
        Ok(removed)
    }

    /// Assets of one placement in display order.
    pub async fn assets_at(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<Vec<StoredAsset>> {
        match self.store.placement(website_id, placement_path).await? {
            Some(placement) => self.store.assets(placement.id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_placements(&self, website_id: DbId) -> PipelineResult<Vec<PlacementWithAssets>> {
        self.store.placements(website_id).await
    }

    /// Persist a normalized upload.
    ///
    /// Without a website the image goes to the temporary area and is picked
    /// up by [`finalize_temp_images`](Self::finalize_temp_images) on submit.
    pub async fn store_upload(
        &self,
        website_id: Option<DbId>,
        placement_path: &str,
        original_name: &str,
        image: NormalizedImage,
        mode: RegisterMode,
    ) -> PipelineResult<UploadTarget> {
        let Some(website_id) = website_id else {
            let key = storage::temp_key(original_name);
            let blob = self.blobs.put(&key, image.bytes, image.mime_type).await?;
            return Ok(UploadTarget::Temporary(blob));
        };

        let key = storage::website_key(website_id, placement_path, original_name);
        let size_bytes = image.bytes.len() as i64;
        let blob = self.blobs.put(&key, image.bytes, image.mime_type).await?;
        let meta = NewStoredAsset {
            storage_key: blob.key,
            url: blob.url,
            original_name: original_name.to_string(),
            mime_type: image.mime_type.to_string(),
            size_bytes,
            width: Some(image.width as i32),
            height: Some(image.height as i32),
        };
        let asset = self
            .register_asset(website_id, placement_path, &meta, mode)
            .await?;
        Ok(UploadTarget::Registered(asset))
    }

    /// Copy every temporary image referenced by `snapshot` into the website's
    /// permanent space and rewrite the references in place.
    ///
    /// A reference inside a list (`gallery.photos.images[1]`) is appended to
    /// the list's placement; any other reference replaces its placement's
    /// asset. The temporary blobs are left alone so a failed submission can be
    /// retried; the returned keys go to
    /// [`release_temp_images`](Self::release_temp_images) once the content is
    /// committed.
    pub async fn finalize_temp_images(
        &self,
        website_id: DbId,
        snapshot: &mut Value,
    ) -> PipelineResult<Vec<String>> {
        let temp_refs = content::find_strings(snapshot, |s| self.blobs.is_temp_url(s));
        if temp_refs.is_empty() {
            return Ok(Vec::new());
        }

        let mut rewritten: HashMap<FieldPath, String> = HashMap::with_capacity(temp_refs.len());
        let mut consumed = Vec::with_capacity(temp_refs.len());
        for (path, temp_url) in temp_refs {
            let (permanent, temp_key) = self.promote(website_id, &path, &temp_url).await?;
            rewritten.insert(path, permanent);
            consumed.push(temp_key);
        }

        let count = content::rewrite_strings(snapshot, |path, _| rewritten.get(path).cloned());
        tracing::info!(website_id, count, "Finalized temporary images");
        Ok(consumed)
    }

    /// Delete temporary blobs whose content now lives under a website.
    pub async fn release_temp_images(&self, temp_keys: &[String]) {
        for key in temp_keys {
            self.delete_blob(key).await;
        }
    }

    /// Delete the blobs of every asset registered for a website. The rows are
    /// left to the caller.
    pub async fn discard_website_assets(&self, website_id: DbId) -> PipelineResult<()> {
        for placement in self.store.placements(website_id).await? {
            self.delete_blobs(&placement.assets).await;
        }
        Ok(())
    }

    async fn promote(
        &self,
        website_id: DbId,
        path: &FieldPath,
        temp_url: &str,
    ) -> PipelineResult<(String, String)> {
        let (placement, mode) = if path.is_list_element() {
            (path.parent(), RegisterMode::Append)
        } else {
            (path.clone(), RegisterMode::Replace)
        };
        let placement_path = placement.to_string();

        // Only called for URLs the store recognised as temporary.
        let temp_key = self.blobs.key_for_url(temp_url).unwrap_or_default();
        let bytes = self.blobs.get(&temp_key).await?;
        let original_name = storage::file_name_from_key(&temp_key).to_string();
        let (width, height) = imaging::probe_dimensions(&bytes).unzip();
        let size_bytes = bytes.len() as i64;

        let key = storage::website_key(website_id, &placement_path, &original_name);
        let blob = self.blobs.put(&key, bytes, OUTPUT_MIME).await?;
        let meta = NewStoredAsset {
            storage_key: blob.key,
            url: blob.url.clone(),
            original_name,
            mime_type: OUTPUT_MIME.to_string(),
            size_bytes,
            width: width.map(|w| w as i32),
            height: height.map(|h| h as i32),
        };
        self.register_asset(website_id, &placement_path, &meta, mode)
            .await?;

        Ok((blob.url, temp_key))
    }

    async fn delete_blobs(&self, assets: &[StoredAsset]) {
        for asset in assets {
            self.delete_blob(&asset.storage_key).await;
        }
    }

    async fn delete_blob(&self, key: &str) {
        match self.blobs.delete(key).await {
            Ok(DeleteOutcome::Deleted) => {}
            Ok(DeleteOutcome::NotFound) => {
                tracing::debug!(key = %key, "Blob already gone");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to delete blob");
            }
        }
    }
}
