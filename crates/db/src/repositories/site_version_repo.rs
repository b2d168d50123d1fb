//! Repository for the `site_versions` table.
//!
//! Every operation that moves the active marker also rewrites the website's
//! pointer columns inside the same transaction, so the pair never disagrees.

use schoolsite_core::types::DbId;
use sqlx::PgPool;

use crate::models::site_version::{CreateSiteVersion, SiteVersion};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, website_id, version_number, data, change_description, \
    build_path, is_active, created_at";

/// Provides version creation, activation and build bookkeeping.
pub struct SiteVersionRepo;

impl SiteVersionRepo {
    /// Create a new version and make it the active one.
    ///
    /// In one transaction: lock the website row, allocate `max + 1` (or 1),
    /// clear the previous active marker, insert the new version active and
    /// point the website at it. Nothing is written if any step fails, so a
    /// failed call never consumes a version number.
    ///
    /// Returns `RowNotFound` if the website does not exist.
    pub async fn create_as_active(
        pool: &PgPool,
        input: &CreateSiteVersion,
    ) -> Result<SiteVersion, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Serializes concurrent submissions for the same website.
        sqlx::query("SELECT id FROM websites WHERE id = $1 FOR UPDATE")
            .bind(input.website_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let next: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version_number), 0) + 1 \
             FROM site_versions WHERE website_id = $1",
        )
        .bind(input.website_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE site_versions SET is_active = false \
             WHERE website_id = $1 AND is_active",
        )
        .bind(input.website_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO site_versions
                (website_id, version_number, data, change_description, is_active)
             VALUES ($1, $2, $3, $4, true)
             RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, SiteVersion>(&query)
            .bind(input.website_id)
            .bind(next.0)
            .bind(&input.data)
            .bind(&input.change_description)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE websites SET \
                current_version = $2, \
                data = $3, \
                theme_id = COALESCE($4, theme_id) \
             WHERE id = $1",
        )
        .bind(input.website_id)
        .bind(version.version_number)
        .bind(&version.data)
        .bind(&input.theme_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SiteVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM site_versions WHERE id = $1");
        sqlx::query_as::<_, SiteVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The active version of a website, if it has any versions.
    pub async fn find_active(
        pool: &PgPool,
        website_id: DbId,
    ) -> Result<Option<SiteVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM site_versions \
             WHERE website_id = $1 AND is_active"
        );
        sqlx::query_as::<_, SiteVersion>(&query)
            .bind(website_id)
            .fetch_optional(pool)
            .await
    }

    /// All versions of a website in creation order (ascending number).
    pub async fn list_by_website(
        pool: &PgPool,
        website_id: DbId,
    ) -> Result<Vec<SiteVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM site_versions \
             WHERE website_id = $1 \
             ORDER BY version_number ASC"
        );
        sqlx::query_as::<_, SiteVersion>(&query)
            .bind(website_id)
            .fetch_all(pool)
            .await
    }

    /// Make `version_id` the active version of `website_id`.
    ///
    /// The website's `current_version` and `data` are pointed at the target;
    /// `current_build_path` follows the target when it has its own build.
    /// Returns `None` (and changes nothing) if the version does not belong to
    /// the website.
    pub async fn set_active(
        pool: &PgPool,
        website_id: DbId,
        version_id: DbId,
    ) -> Result<Option<SiteVersion>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists = sqlx::query(
            "SELECT id FROM site_versions WHERE id = $1 AND website_id = $2 FOR UPDATE",
        )
        .bind(version_id)
        .bind(website_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE site_versions SET is_active = false \
             WHERE website_id = $1 AND is_active AND id <> $2",
        )
        .bind(website_id)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE site_versions SET is_active = true \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, SiteVersion>(&query)
            .bind(version_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE websites SET \
                current_version = $2, \
                data = $3, \
                current_build_path = COALESCE($4, current_build_path) \
             WHERE id = $1",
        )
        .bind(website_id)
        .bind(version.version_number)
        .bind(&version.data)
        .bind(&version.build_path)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(version))
    }

    /// Record a successful build of `version_id`.
    ///
    /// Always stores the version's `build_path`; the website's
    /// `current_build_path` is only moved when the version is still active.
    pub async fn record_build(
        pool: &PgPool,
        version_id: DbId,
        build_path: &str,
    ) -> Result<Option<SiteVersion>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE site_versions SET build_path = $2 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, SiteVersion>(&query)
            .bind(version_id)
            .bind(build_path)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(v) = version.as_ref().filter(|v| v.is_active) {
            sqlx::query(
                "UPDATE websites SET current_build_path = $2, current_version = $3 WHERE id = $1",
            )
            .bind(v.website_id)
            .bind(build_path)
            .bind(v.version_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    /// Number of active versions for a website. Anything above 1 is an
    /// integrity violation.
    pub async fn count_active(pool: &PgPool, website_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM site_versions WHERE website_id = $1 AND is_active",
        )
        .bind(website_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Keep only the highest-numbered active version active. Returns how many
    /// rows were demoted.
    pub async fn repair_active(pool: &PgPool, website_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE site_versions SET is_active = false \
             WHERE website_id = $1 AND is_active AND id <> ( \
                 SELECT id FROM site_versions \
                 WHERE website_id = $1 AND is_active \
                 ORDER BY version_number DESC LIMIT 1 \
             )",
        )
        .bind(website_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
