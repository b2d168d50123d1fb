//! Repository for the `websites` table.

use schoolsite_core::types::DbId;
use sqlx::PgPool;

use crate::models::website::{CreateWebsite, Website, DEFAULT_WEBSITE_NAME};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, owner_id, name, theme_id, current_version, data, \
    status, current_build_path, created_at, updated_at";

/// Provides persistence for website records.
pub struct WebsiteRepo;

impl WebsiteRepo {
    /// Insert a new website with no versions yet.
    pub async fn create(pool: &PgPool, input: &CreateWebsite) -> Result<Website, sqlx::Error> {
        let query = format!(
            "INSERT INTO websites (owner_id, name, theme_id, data)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_WEBSITE_NAME);
        sqlx::query_as::<_, Website>(&query)
            .bind(input.owner_id)
            .bind(name)
            .bind(&input.theme_id)
            .bind(&input.data)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Website>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM websites WHERE id = $1");
        sqlx::query_as::<_, Website>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a website. Versions and asset rows go with it (`ON DELETE CASCADE`).
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM websites WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List websites owned by `owner_id`, most recently updated first.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Website>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM websites WHERE owner_id = $1 ORDER BY updated_at DESC, id DESC"
        );
        sqlx::query_as::<_, Website>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// List every website (super-admin view), most recently updated first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Website>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM websites ORDER BY updated_at DESC, id DESC");
        sqlx::query_as::<_, Website>(&query).fetch_all(pool).await
    }

    /// Set `status` (`active` / `inactive`). Returns `None` if the website does not exist.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: &str,
    ) -> Result<Option<Website>, sqlx::Error> {
        let query = format!("UPDATE websites SET status = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Website>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// IDs of websites with more than one active version.
    ///
    /// The partial unique index makes this impossible for rows written by
    /// this schema; the check exists for databases restored from older dumps.
    pub async fn find_with_multiple_active(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT website_id FROM site_versions \
             WHERE is_active \
             GROUP BY website_id \
             HAVING COUNT(*) > 1 \
             ORDER BY website_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
