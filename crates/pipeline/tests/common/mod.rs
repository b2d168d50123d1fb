//! Shared fixtures for pipeline integration tests.
//!
//! [`MemoryStore`] is an in-process [`SiteStore`] with the same invariants as
//! the Postgres implementation, so orchestrator behavior can be exercised
//! without a database.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use schoolsite_core::storage::LocalBlobStore;
use schoolsite_core::types::DbId;
use schoolsite_db::models::asset::{
    AssetPlacement, NewStoredAsset, PlacementWithAssets, StoredAsset,
};
use schoolsite_db::models::site_version::{CreateSiteVersion, SiteVersion};
use schoolsite_db::models::website::{CreateWebsite, Website, DEFAULT_WEBSITE_NAME};
use schoolsite_pipeline::build::GeneratorConfig;
use schoolsite_pipeline::{Orchestrator, PipelineConfig, PipelineError, PipelineResult, SiteStore};
use tempfile::TempDir;

pub const BASIC_SCHEMA: &str = include_str!("../fixtures/basic_theme.json");

/// Public URL prefix of the test blob store.
pub const UPLOADS_URL: &str = "/uploads";

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_id: DbId,
    websites: Vec<Website>,
    versions: Vec<SiteVersion>,
    placements: Vec<AssetPlacement>,
    assets: Vec<StoredAsset>,
}

impl Inner {
    fn id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn website_mut(&mut self, id: DbId) -> Option<&mut Website> {
        self.websites.iter_mut().find(|w| w.id == id)
    }

    fn sorted_assets(&self, placement_id: DbId) -> Vec<StoredAsset> {
        let mut assets: Vec<StoredAsset> = self
            .assets
            .iter()
            .filter(|a| a.placement_id == placement_id)
            .cloned()
            .collect();
        assets.sort_by_key(|a| (a.sort_order, a.id));
        assets
    }

    fn insert_asset(&mut self, placement_id: DbId, asset: &NewStoredAsset, sort_order: i32) -> StoredAsset {
        let row = StoredAsset {
            id: self.id(),
            placement_id,
            storage_key: asset.storage_key.clone(),
            url: asset.url.clone(),
            original_name: asset.original_name.clone(),
            mime_type: asset.mime_type.clone(),
            size_bytes: asset.size_bytes,
            width: asset.width,
            height: asset.height,
            sort_order,
            created_at: Utc::now(),
        };
        self.assets.push(row.clone());
        row
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn website_count(&self) -> usize {
        self.inner.lock().unwrap().websites.len()
    }

    pub fn version_count(&self) -> usize {
        self.inner.lock().unwrap().versions.len()
    }

    pub fn active_count(&self, website_id: DbId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .versions
            .iter()
            .filter(|v| v.website_id == website_id && v.is_active)
            .count()
    }

    /// Mark a version active without clearing the others, simulating rows
    /// written before the invariant was enforced.
    pub fn force_active(&self, version_id: DbId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(v) = inner.versions.iter_mut().find(|v| v.id == version_id) {
            v.is_active = true;
        }
    }

    /// Insert a website directly, bypassing the orchestrator.
    pub fn seed_website(&self, owner_id: DbId, theme_id: &str, data: serde_json::Value) -> Website {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let website = Website {
            id: inner.id(),
            owner_id,
            name: DEFAULT_WEBSITE_NAME.to_string(),
            theme_id: theme_id.to_string(),
            current_version: None,
            data,
            status: "active".to_string(),
            current_build_path: None,
            created_at: now,
            updated_at: now,
        };
        inner.websites.push(website.clone());
        website
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn create_website(&self, input: &CreateWebsite) -> PipelineResult<Website> {
        let name = input
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WEBSITE_NAME.to_string());
        let mut website = self.seed_website(input.owner_id, &input.theme_id, input.data.clone());
        website.name = name;
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.website_mut(website.id) {
            *row = website.clone();
        }
        Ok(website)
    }

    async fn find_website(&self, id: DbId) -> PipelineResult<Option<Website>> {
        Ok(self.inner.lock().unwrap().websites.iter().find(|w| w.id == id).cloned())
    }

    async fn delete_website(&self, id: DbId) -> PipelineResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.websites.len();
        inner.websites.retain(|w| w.id != id);
        inner.versions.retain(|v| v.website_id != id);
        let placement_ids: Vec<DbId> = inner
            .placements
            .iter()
            .filter(|p| p.website_id == id)
            .map(|p| p.id)
            .collect();
        inner.placements.retain(|p| p.website_id != id);
        inner.assets.retain(|a| !placement_ids.contains(&a.placement_id));
        Ok(inner.websites.len() < before)
    }

    async fn create_active_version(&self, input: &CreateSiteVersion) -> PipelineResult<SiteVersion> {
        let mut inner = self.inner.lock().unwrap();
        if inner.website_mut(input.website_id).is_none() {
            return Err(PipelineError::Database(sqlx::Error::RowNotFound));
        }

        let next = inner
            .versions
            .iter()
            .filter(|v| v.website_id == input.website_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        for v in inner.versions.iter_mut().filter(|v| v.website_id == input.website_id) {
            v.is_active = false;
        }
        let version = SiteVersion {
            id: inner.id(),
            website_id: input.website_id,
            version_number: next,
            data: input.data.clone(),
            change_description: input.change_description.clone(),
            build_path: None,
            is_active: true,
            created_at: Utc::now(),
        };
        inner.versions.push(version.clone());

        let website = inner.website_mut(input.website_id).unwrap();
        website.current_version = Some(next);
        website.data = input.data.clone();
        if let Some(theme_id) = &input.theme_id {
            website.theme_id = theme_id.clone();
        }
        website.updated_at = Utc::now();
        Ok(version)
    }

    async fn find_version(&self, id: DbId) -> PipelineResult<Option<SiteVersion>> {
        Ok(self.inner.lock().unwrap().versions.iter().find(|v| v.id == id).cloned())
    }

    async fn versions(&self, website_id: DbId) -> PipelineResult<Vec<SiteVersion>> {
        let mut versions: Vec<SiteVersion> = self
            .inner
            .lock()
            .unwrap()
            .versions
            .iter()
            .filter(|v| v.website_id == website_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    async fn activate_version(
        &self,
        website_id: DbId,
        version_id: DbId,
    ) -> PipelineResult<Option<SiteVersion>> {
        let mut inner = self.inner.lock().unwrap();
        let belongs = inner
            .versions
            .iter()
            .any(|v| v.id == version_id && v.website_id == website_id);
        if !belongs {
            return Ok(None);
        }

        let mut target = None;
        for v in inner.versions.iter_mut().filter(|v| v.website_id == website_id) {
            v.is_active = v.id == version_id;
            if v.is_active {
                target = Some(v.clone());
            }
        }
        let target = target.unwrap();

        let website = inner.website_mut(website_id).unwrap();
        website.current_version = Some(target.version_number);
        website.data = target.data.clone();
        if target.build_path.is_some() {
            website.current_build_path = target.build_path.clone();
        }
        Ok(Some(target))
    }

    async fn record_build(
        &self,
        version_id: DbId,
        build_path: &str,
    ) -> PipelineResult<Option<SiteVersion>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(version) = inner.versions.iter_mut().find(|v| v.id == version_id) else {
            return Ok(None);
        };
        version.build_path = Some(build_path.to_string());
        let version = version.clone();

        if version.is_active {
            let website = inner.website_mut(version.website_id).unwrap();
            website.current_build_path = Some(build_path.to_string());
            website.current_version = Some(version.version_number);
        }
        Ok(Some(version))
    }

    async fn repair_active(&self, website_id: DbId) -> PipelineResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let keep = inner
            .versions
            .iter()
            .filter(|v| v.website_id == website_id && v.is_active)
            .max_by_key(|v| v.version_number)
            .map(|v| v.id);
        let mut demoted = 0;
        for v in inner
            .versions
            .iter_mut()
            .filter(|v| v.website_id == website_id && v.is_active && Some(v.id) != keep)
        {
            v.is_active = false;
            demoted += 1;
        }
        Ok(demoted)
    }

    async fn placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<Option<AssetPlacement>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .placements
            .iter()
            .find(|p| p.website_id == website_id && p.placement_path == placement_path)
            .cloned())
    }

    async fn ensure_placement(
        &self,
        website_id: DbId,
        placement_path: &str,
    ) -> PipelineResult<AssetPlacement> {
        if let Some(existing) = self.placement(website_id, placement_path).await? {
            return Ok(existing);
        }
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let placement = AssetPlacement {
            id: inner.id(),
            website_id,
            placement_path: placement_path.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.placements.push(placement.clone());
        Ok(placement)
    }

    async fn append_asset(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<StoredAsset> {
        let mut inner = self.inner.lock().unwrap();
        let next = inner
            .assets
            .iter()
            .filter(|a| a.placement_id == placement_id)
            .map(|a| a.sort_order)
            .max()
            .map_or(0, |max| max + 1);
        Ok(inner.insert_asset(placement_id, asset, next))
    }

    async fn replace_assets(
        &self,
        placement_id: DbId,
        asset: &NewStoredAsset,
    ) -> PipelineResult<(StoredAsset, Vec<StoredAsset>)> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.sorted_assets(placement_id);
        inner.assets.retain(|a| a.placement_id != placement_id);
        let inserted = inner.insert_asset(placement_id, asset, 0);
        Ok((inserted, removed))
    }

    async fn reconcile_assets(
        &self,
        placement_id: DbId,
        remaining_urls: &[String],
    ) -> PipelineResult<Vec<StoredAsset>> {
        let mut inner = self.inner.lock().unwrap();
        let removed: Vec<StoredAsset> = inner
            .sorted_assets(placement_id)
            .into_iter()
            .filter(|a| !remaining_urls.contains(&a.url))
            .collect();
        inner
            .assets
            .retain(|a| a.placement_id != placement_id || remaining_urls.contains(&a.url));
        for asset in inner.assets.iter_mut().filter(|a| a.placement_id == placement_id) {
            if let Some(pos) = remaining_urls.iter().position(|u| u == &asset.url) {
                asset.sort_order = pos as i32;
            }
        }
        Ok(removed)
    }

    async fn assets(&self, placement_id: DbId) -> PipelineResult<Vec<StoredAsset>> {
        Ok(self.inner.lock().unwrap().sorted_assets(placement_id))
    }

    async fn placements(&self, website_id: DbId) -> PipelineResult<Vec<PlacementWithAssets>> {
        let inner = self.inner.lock().unwrap();
        let mut placements: Vec<AssetPlacement> = inner
            .placements
            .iter()
            .filter(|p| p.website_id == website_id)
            .cloned()
            .collect();
        placements.sort_by(|a, b| a.placement_path.cmp(&b.placement_path));
        Ok(placements
            .into_iter()
            .map(|placement| PlacementWithAssets {
                assets: inner.sorted_assets(placement.id),
                placement,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Generator stand-in: renders `index.html` into the destination, and fails
/// when the site data contains the word `BREAK`.
pub const GENERATOR_SCRIPT: &str = r#"
if grep -q BREAK "$2/data/site.json"; then
    echo "render error: template failed on BREAK" >&2
    exit 3
fi
mkdir -p "$4"
cp "$2/data/site.json" "$4/site-data.json"
echo '<html><body>ok</body></html>' > "$4/index.html"
echo "built $2"
"#;

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<LocalBlobStore>,
    pub orchestrator: Orchestrator<MemoryStore>,
}

impl Harness {
    pub fn sites_dir(&self) -> PathBuf {
        self.dir.path().join("sites")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Leftover temporary build trees.
    pub fn leftover_work_dirs(&self) -> usize {
        std::fs::read_dir(self.work_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let themes = dir.path().join("themes");
    write_theme(&themes, "basic");
    write_theme(&themes, "modern");
    std::fs::create_dir_all(dir.path().join("work")).unwrap();

    let generator = write_script(dir.path(), "fake-hugo", GENERATOR_SCRIPT);
    let config = PipelineConfig {
        themes_dir: themes,
        sites_dir: dir.path().join("sites"),
        work_dir: dir.path().join("work"),
        generator: GeneratorConfig {
            program: generator.display().to_string(),
            extra_args: Vec::new(),
            timeout: Duration::from_secs(20),
        },
        preview_addr: "127.0.0.1:0".parse().unwrap(),
    };

    let store = Arc::new(MemoryStore::default());
    let blobs = Arc::new(LocalBlobStore::new(dir.path().join("uploads"), UPLOADS_URL));
    let orchestrator = Orchestrator::new(Arc::clone(&store), blobs.clone(), &config)
        .unwrap()
        .with_asset_mount_root(dir.path().join("uploads"));

    Harness {
        dir,
        store,
        blobs,
        orchestrator,
    }
}

pub fn write_theme(root: &Path, id: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(dir.join("layouts")).unwrap();
    let schema = BASIC_SCHEMA.replacen("\"Basic School\"", &format!("\"Theme {id}\""), 1);
    std::fs::write(dir.join("theme.json"), schema).unwrap();
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A small encoded JPEG.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([30, 120, 60]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}
