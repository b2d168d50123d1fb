//! Version/build orchestrator.
//!
//! Owns the submit → finalize → version → materialize → build sequence and
//! the activation/rebuild paths. Work for one website is serialized by a
//! per-website async lock; different websites proceed in parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schoolsite_core::error::CoreError;
use schoolsite_core::storage::{BlobStore, WEBSITES_PREFIX};
use schoolsite_core::theme::{ThemeCatalog, ThemeSchema};
use schoolsite_core::types::DbId;
use schoolsite_core::validation::{apply_defaults, validate_snapshot};
use schoolsite_db::models::site_version::{CreateSiteVersion, SiteVersion};
use schoolsite_db::models::website::{CreateWebsite, Website};
use serde::Serialize;
use serde_json::Value;

use crate::assets::AssetRegistry;
use crate::build::{remove_dir_logged, BuildInvoker};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::materialize::{materialize, SiteSource};
use crate::store::SiteStore;

/// Snapshot copy written next to every successful build.
pub const CONTENT_FILE: &str = "content.json";

/// Description given to versions created from a website's existing data.
pub const INITIAL_VERSION_DESCRIPTION: &str = "Initial version";

/// A content submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// `None` creates a new website (first generation).
    pub website_id: Option<DbId>,
    /// Required for new websites; switches the theme of existing ones.
    pub theme_id: Option<String>,
    pub snapshot: Value,
    pub change_description: Option<String>,
    /// Display name for new websites.
    pub name: Option<String>,
    pub user_id: DbId,
}

/// A website together with one of its versions.
#[derive(Debug, Clone, Serialize)]
pub struct VersionOutcome {
    pub website: Website,
    pub version: SiteVersion,
}

pub struct Orchestrator<S> {
    store: Arc<S>,
    assets: AssetRegistry<S>,
    themes: ThemeCatalog,
    builder: BuildInvoker,
    sites_dir: PathBuf,
    work_dir: PathBuf,
    /// Local blob root whose `websites/<id>` directory is mounted as static files.
    asset_mount_root: Option<PathBuf>,
    locks: std::sync::Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: SiteStore> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        blobs: Arc<dyn BlobStore>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        Ok(Self {
            assets: AssetRegistry::new(Arc::clone(&store), blobs),
            store,
            themes: ThemeCatalog::open(&config.themes_dir)?,
            builder: BuildInvoker::new(config.generator.clone()),
            sites_dir: config.sites_dir.clone(),
            work_dir: config.work_dir.clone(),
            asset_mount_root: None,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Mount `<root>/websites/<id>` into every build of website `<id>`.
    pub fn with_asset_mount_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_mount_root = Some(root.into());
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn assets(&self) -> &AssetRegistry<S> {
        &self.assets
    }

    pub fn themes(&self) -> &ThemeCatalog {
        &self.themes
    }

    pub async fn website(&self, website_id: DbId) -> PipelineResult<Website> {
        self.store
            .find_website(website_id)
            .await?
            .ok_or_else(|| not_found("website", website_id))
    }

    /// Validate, version and build submitted content.
    ///
    /// Nothing is persisted when validation fails, and a first submission
    /// that fails before its version is stored leaves no website behind. A
    /// build failure returns `CoreError::Build` but keeps the new version
    /// (with no build path) as the active one.
    pub async fn submit(&self, request: SubmitRequest) -> PipelineResult<VersionOutcome> {
        let existing = match request.website_id {
            Some(id) => Some(self.website(id).await?),
            None => None,
        };

        let theme_id = match (&request.theme_id, &existing) {
            (Some(theme_id), _) if !theme_id.trim().is_empty() => theme_id.trim().to_string(),
            (_, Some(website)) => website.theme_id.clone(),
            (_, None) => {
                return Err(CoreError::Validation("theme_id is required".into()).into());
            }
        };
        let schema = self.themes.schema(&theme_id).await?;

        let report = validate_snapshot(&schema, &request.snapshot);
        if !report.is_valid {
            return Err(CoreError::InvalidFields(report.errors).into());
        }
        if !report.warnings.is_empty() {
            tracing::debug!(
                theme_id = %theme_id,
                warnings = report.warnings.len(),
                "Submission contains fields the theme does not declare",
            );
        }

        let created = existing.is_none();
        let website = match existing {
            Some(website) => website,
            None => {
                let website = self
                    .store
                    .create_website(&CreateWebsite {
                        owner_id: request.user_id,
                        name: request.name.clone(),
                        theme_id: theme_id.clone(),
                        data: Value::Object(Default::default()),
                    })
                    .await?;
                tracing::info!(website_id = website.id, owner_id = website.owner_id, theme_id = %theme_id, "Website created");
                website
            }
        };

        let lock = self.website_lock(website.id);
        let _guard = lock.lock().await;

        let committed = self
            .commit_version(CreateSiteVersion {
                website_id: website.id,
                data: request.snapshot,
                change_description: request.change_description,
                theme_id: Some(theme_id),
            })
            .await;
        let version = match committed {
            Ok(version) => version,
            Err(e) => {
                // A new website only exists once its first version does.
                if created {
                    self.discard_website(website.id).await;
                }
                return Err(e);
            }
        };
        tracing::info!(
            website_id = website.id,
            version = version.version_number,
            user_id = request.user_id,
            "Site version created",
        );

        let version = self.build_version(&schema, &version).await?;
        let website = self.website(website.id).await?;
        Ok(VersionOutcome { website, version })
    }

    /// Make `version_id` the active version of `website_id`. No rebuild.
    pub async fn activate(&self, website_id: DbId, version_id: DbId) -> PipelineResult<VersionOutcome> {
        let lock = self.website_lock(website_id);
        let _guard = lock.lock().await;

        self.website(website_id).await?;
        let version = self
            .store
            .activate_version(website_id, version_id)
            .await?
            .ok_or_else(|| not_found("site_version", version_id))?;
        let website = self.website(website_id).await?;

        if let Some(build_path) = &website.current_build_path {
            if let Err(e) = write_content_file(Path::new(build_path), &version.data).await {
                tracing::warn!(
                    website_id,
                    build_path = %build_path,
                    error = %e,
                    "Failed to refresh content file after activation",
                );
            }
        }

        tracing::info!(website_id, version = version.version_number, "Site version activated");
        Ok(VersionOutcome { website, version })
    }

    /// Re-run the build for a stored version without resubmitting content.
    pub async fn rebuild(&self, website_id: DbId, version_id: DbId) -> PipelineResult<VersionOutcome> {
        let lock = self.website_lock(website_id);
        let _guard = lock.lock().await;

        let website = self.website(website_id).await?;
        let version = self
            .store
            .find_version(version_id)
            .await?
            .filter(|v| v.website_id == website_id)
            .ok_or_else(|| not_found("site_version", version_id))?;
        let schema = self.themes.schema(&website.theme_id).await?;

        let version = self.build_version(&schema, &version).await?;
        let website = self.website(website_id).await?;
        Ok(VersionOutcome { website, version })
    }

    /// Versions of a website in ascending order.
    ///
    /// A website without versions gets version 1 created from its current
    /// data. More than one active version is logged and repaired in place.
    pub async fn list_versions(&self, website_id: DbId) -> PipelineResult<Vec<SiteVersion>> {
        let lock = self.website_lock(website_id);
        let _guard = lock.lock().await;

        let website = self.website(website_id).await?;
        let versions = self.store.versions(website_id).await?;

        if versions.is_empty() {
            let initial = self
                .store
                .create_active_version(&CreateSiteVersion {
                    website_id,
                    data: website.data,
                    change_description: Some(INITIAL_VERSION_DESCRIPTION.to_string()),
                    theme_id: None,
                })
                .await?;
            tracing::info!(website_id, "Created initial version for website without history");
            return Ok(vec![initial]);
        }

        let active = versions.iter().filter(|v| v.is_active).count();
        if active > 1 {
            tracing::error!(website_id, active, "Multiple active versions found; repairing");
            let demoted = self.store.repair_active(website_id).await?;
            tracing::warn!(website_id, demoted, "Demoted extra active versions");
            return self.store.versions(website_id).await;
        }

        Ok(versions)
    }

    /// Finalize temporary images in `input.data` and store it as the new
    /// active version. Temporary blobs are released only after the version
    /// row exists.
    async fn commit_version(&self, mut input: CreateSiteVersion) -> PipelineResult<SiteVersion> {
        let temp_keys = self
            .assets
            .finalize_temp_images(input.website_id, &mut input.data)
            .await?;
        let version = self.store.create_active_version(&input).await?;
        self.assets.release_temp_images(&temp_keys).await;
        Ok(version)
    }

    /// Remove a website created by a submission that failed before its first
    /// version was stored.
    async fn discard_website(&self, website_id: DbId) {
        if let Err(e) = self.assets.discard_website_assets(website_id).await {
            tracing::warn!(website_id, error = %e, "Failed to delete assets of discarded website");
        }
        match self.store.delete_website(website_id).await {
            Ok(_) => tracing::info!(website_id, "Discarded website after failed first submission"),
            Err(e) => {
                tracing::error!(website_id, error = %e, "Failed to discard website after failed first submission");
            }
        }
    }

    /// Materialize and build `version`, then record the output.
    async fn build_version(
        &self,
        schema: &ThemeSchema,
        version: &SiteVersion,
    ) -> PipelineResult<SiteVersion> {
        let website_id = version.website_id;
        let run_id = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        );
        let work_dir = self
            .work_dir
            .join(format!("schoolsite-build-{website_id}-{run_id}"));
        let version_dir = format!("v{}", version.version_number);
        let output_dir = self.sites_dir.join(website_id.to_string()).join(&version_dir);
        // The generator writes next to the live output; a failed run never
        // touches what `output_dir` currently serves.
        let staging_dir = output_dir.with_file_name(format!("{version_dir}.staging-{run_id}"));
        if let Some(parent) = output_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut data = version.data.clone();
        apply_defaults(schema, &mut data);
        let static_mounts: Vec<PathBuf> = self
            .asset_mount_root
            .iter()
            .map(|root| root.join(WEBSITES_PREFIX).join(website_id.to_string()))
            .filter(|dir| dir.is_dir())
            .collect();

        let source = SiteSource {
            theme: schema,
            themes_dir: self.themes.root(),
            snapshot: &data,
            output_dir: &staging_dir,
            static_mounts: &static_mounts,
        };
        if let Err(e) = materialize(&work_dir, &source).await {
            remove_dir_logged(&work_dir).await;
            remove_dir_logged(&staging_dir).await;
            return Err(e);
        }

        let built = self
            .builder
            .build(&work_dir, &staging_dir)
            .await
            .map_err(|e| annotate_build_error(e, version))?;
        replace_output(&built.output_dir, &output_dir).await?;

        write_content_file(&output_dir, &version.data).await?;

        let build_path = output_dir.display().to_string();
        let recorded = self
            .store
            .record_build(version.id, &build_path)
            .await?
            .ok_or_else(|| not_found("site_version", version.id))?;
        Ok(recorded)
    }

    fn website_lock(&self, website_id: DbId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(website_id).or_default())
    }
}

fn not_found(entity: &'static str, id: DbId) -> PipelineError {
    CoreError::NotFound { entity, id }.into()
}

fn annotate_build_error(err: PipelineError, version: &SiteVersion) -> PipelineError {
    match err {
        PipelineError::Core(CoreError::Build { message, output }) => {
            tracing::warn!(
                website_id = version.website_id,
                version = version.version_number,
                message = %message,
                "Build failed; version kept without output",
            );
            CoreError::Build {
                message: format!(
                    "Website {} version {}: {message}",
                    version.website_id, version.version_number
                ),
                output,
            }
            .into()
        }
        other => other,
    }
}

/// Move a finished build from `staging` to `output_dir`, replacing any
/// previous output of the same version. The previous output is restored if
/// the new one cannot be moved into place.
async fn replace_output(staging: &Path, output_dir: &Path) -> PipelineResult<()> {
    let retired = output_dir.with_file_name(format!(
        "{}.retired-{}",
        output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid::Uuid::new_v4().simple()
    ));
    let had_previous = match tokio::fs::rename(output_dir, &retired).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            remove_dir_logged(staging).await;
            return Err(e.into());
        }
    };

    if let Err(e) = tokio::fs::rename(staging, output_dir).await {
        if had_previous {
            if let Err(restore) = tokio::fs::rename(&retired, output_dir).await {
                tracing::error!(
                    path = %output_dir.display(),
                    error = %restore,
                    "Failed to restore previous build output",
                );
            }
        }
        remove_dir_logged(staging).await;
        return Err(e.into());
    }

    if had_previous {
        remove_dir_logged(&retired).await;
    }
    Ok(())
}

async fn write_content_file(output_dir: &Path, data: &Value) -> PipelineResult<()> {
    let bytes = serde_json::to_vec_pretty(data)
        .map_err(|e| CoreError::Internal(format!("Failed to encode content: {e}")))?;
    tokio::fs::write(output_dir.join(CONTENT_FILE), bytes).await?;
    Ok(())
}
